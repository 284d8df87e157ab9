//! Everything that glues the interpreter to a running process: image
//! loading and the top-level run loop.

pub mod loader;
pub mod platform;

pub use platform::{Platform, RunOutcome};
