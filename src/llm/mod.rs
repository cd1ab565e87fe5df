pub mod client;
pub mod decode;
pub mod prompts;
pub mod retry;

pub use client::*;
pub use decode::*;
pub use prompts::*;
pub use retry::*;
