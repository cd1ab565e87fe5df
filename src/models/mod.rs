pub mod analysis;
pub mod input;
pub mod language;
pub mod request;
pub mod scenario;

pub use analysis::*;
pub use input::*;
pub use language::*;
pub use request::*;
pub use scenario::*;
