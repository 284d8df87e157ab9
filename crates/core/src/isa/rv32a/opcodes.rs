pub const OP_AMO: u32 = 0b0101111;
