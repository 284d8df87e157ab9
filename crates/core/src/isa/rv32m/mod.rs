//! RV32M multiply/divide extension encodings.

pub mod funct3;
pub mod opcodes;
