pub mod batch;
pub mod error;
pub mod full_analysis;
pub mod orchestrator;
pub mod transcribe;

pub use batch::*;
pub use error::*;
pub use full_analysis::*;
pub use orchestrator::*;
pub use transcribe::*;
