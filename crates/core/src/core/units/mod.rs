//! Functional units sitting between the interpreter and the bus.

pub mod cache;
