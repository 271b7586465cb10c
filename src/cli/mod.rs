//! Agent CLI invocation, process control and output decoding.

mod command;
mod decoder;
mod events;
mod process;
mod stderr;
mod stream;

pub use command::*;
pub use decoder::*;
pub use events::*;
pub use process::*;
pub use stderr::*;
pub use stream::*;
