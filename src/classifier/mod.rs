pub mod gate;
pub mod model;
pub mod train;

pub use gate::*;
pub use model::*;
pub use train::*;
