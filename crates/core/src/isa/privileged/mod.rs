//! SYSTEM-opcode encodings: ECALL/EBREAK/MRET/WFI/CSR instructions.

pub mod cause;
pub mod opcodes;
