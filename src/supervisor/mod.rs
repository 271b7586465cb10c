//! Process supervision, accumulation and event broadcast.

mod accumulator;
mod bus;
mod runner;
mod state;

pub use accumulator::*;
pub use bus::*;
pub use runner::*;
pub use state::InvocationRequest;
pub(crate) use state::ActiveInvocation;
