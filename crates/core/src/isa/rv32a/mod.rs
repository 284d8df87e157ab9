//! RV32A atomic extension encodings (LR/SC and AMO* single-hart semantics).

pub mod funct3;
pub mod funct5;
pub mod opcodes;
