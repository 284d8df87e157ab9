//! Types shared across the interpreter, cache, and platform glue.

pub mod error;
pub mod reg;

pub use error::{HostError, Trap};
pub use reg::GprFile;
