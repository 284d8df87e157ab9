//! `funct7` values (bits 31-25) distinguishing R-type operations sharing a `funct3`.

pub const DEFAULT: u32 = 0b0000000;
/// SUB (with `ADD_SUB`) and SRA (with `SRL_SRA`).
pub const SUB: u32 = 0b0100000;
pub const SRA: u32 = SUB;
