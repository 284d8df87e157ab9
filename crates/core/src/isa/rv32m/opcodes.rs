//! The M extension shares `OP_REG` with base integer instructions and is
//! distinguished by `funct7 == M_EXTENSION`.

pub const M_EXTENSION: u32 = 0b0000001;
