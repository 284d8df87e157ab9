//! RV32I base integer instruction set encodings.

pub mod funct3;
pub mod funct7;
pub mod opcodes;
