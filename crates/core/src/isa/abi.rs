//! Standard RISC-V ABI register names used by hart initialisation.

pub const REG_A0: u32 = 10;
pub const REG_A1: u32 = 11;
