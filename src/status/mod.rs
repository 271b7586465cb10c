//! Agent installation status.

mod probe;

pub use probe::*;
