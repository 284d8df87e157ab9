//! RV32IMA instruction encoding: opcode/funct tables and decode helpers.

pub mod abi;
pub mod decode;
pub mod instruction;
pub mod privileged;
pub mod rv32a;
pub mod rv32i;
pub mod rv32m;

pub use decode::decode;
pub use instruction::{Decoded, InstructionBits};
