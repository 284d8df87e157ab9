//! Instruction dispatch: the body of [`Hart::step`].

use super::{Hart, StepOutcome};
use crate::bus::Bus;
use crate::common::Trap;
use crate::core::arch::csr::MIP_MTIP;
use crate::isa::privileged::{cause, opcodes as sys_op};
use crate::isa::rv32a::{funct3 as a3, funct5 as f5, opcodes as a_op};
use crate::isa::rv32i::{funct3 as i3, funct7 as i7, opcodes as i_op};
use crate::isa::rv32m::{funct3 as m3, opcodes as m_op};
use crate::isa::decode;

/// What one retired instruction asks the step loop to do next.
enum Retire {
    /// Ordinary retirement; PC already updated by the handler.
    Normal,
    /// EBREAK: `mcause` was stamped but execution continues past the
    /// instruction rather than vectoring into `mtvec` — there is no
    /// debugger attached to act on it (`SPEC_FULL.md` Non-goals), so this
    /// behaves as a benign marker, matching step code `3`.
    Benign,
}

impl Hart {
    /// Advances guest time, services the timer comparator, runs up to
    /// `max_instructions`, and reports why it stopped.
    pub fn step<B: Bus>(&mut self, bus: &mut B, time_delta_us: u64, max_instructions: u32) -> StepOutcome {
        self.time = self.time.wrapping_add(time_delta_us);
        if self.time >= self.timecmp {
            self.csrs.mip |= MIP_MTIP;
        }

        if self.wfi {
            if self.pending_interrupt().is_some() {
                self.wfi = false;
            } else {
                return StepOutcome::WaitForInterrupt;
            }
        }

        for _ in 0..max_instructions {
            if let Some(signal) = bus.take_exit_signal() {
                return StepOutcome::from_code(signal);
            }

            if let Some(trap) = self.pending_interrupt() {
                self.dispatch_trap(trap, self.pc);
                continue;
            }

            let faulting_pc = self.pc;
            match self.retire_one(bus) {
                Ok(Retire::Normal) => {
                    self.cycle = self.cycle.wrapping_add(1);
                }
                Ok(Retire::Benign) => {
                    self.cycle = self.cycle.wrapping_add(1);
                    return StepOutcome::Benign;
                }
                Err(trap) => {
                    self.dispatch_trap(trap, faulting_pc);
                    self.cycle = self.cycle.wrapping_add(1);
                }
            }
        }

        if let Some(signal) = bus.take_exit_signal() {
            return StepOutcome::from_code(signal);
        }
        StepOutcome::Continue
    }

    fn retire_one<B: Bus>(&mut self, bus: &mut B) -> Result<Retire, Trap> {
        if self.pc & 0b11 != 0 {
            return Err(Trap::InstructionAddressMisaligned(self.pc));
        }
        let raw = bus.load4(self.pc).map_err(|_| Trap::InstructionAccessFault(self.pc))?;
        let ir = decode(raw);
        let pc = self.pc;

        let mut next_pc = pc.wrapping_add(4);
        let outcome = self.execute(bus, &ir, pc, &mut next_pc)?;
        self.pc = next_pc;
        Ok(outcome)
    }

    #[allow(clippy::too_many_lines)]
    fn execute<B: Bus>(
        &mut self,
        bus: &mut B,
        ir: &crate::isa::Decoded,
        pc: u32,
        next_pc: &mut u32,
    ) -> Result<Retire, Trap> {
        let rs1 = self.gpr.read(ir.rs1 as u32);
        let rs2 = self.gpr.read(ir.rs2 as u32);

        match ir.opcode {
            i_op::OP_LUI => {
                self.gpr.write(ir.rd as u32, ir.imm as u32);
            }
            i_op::OP_AUIPC => {
                self.gpr.write(ir.rd as u32, pc.wrapping_add(ir.imm as u32));
            }
            i_op::OP_JAL => {
                self.gpr.write(ir.rd as u32, pc.wrapping_add(4));
                *next_pc = pc.wrapping_add(ir.imm as u32);
            }
            i_op::OP_JALR => {
                let target = (rs1.wrapping_add(ir.imm as u32)) & !1;
                self.gpr.write(ir.rd as u32, pc.wrapping_add(4));
                *next_pc = target;
            }
            i_op::OP_BRANCH => {
                let taken = match ir.funct3 {
                    i3::BEQ => rs1 == rs2,
                    i3::BNE => rs1 != rs2,
                    i3::BLT => (rs1 as i32) < (rs2 as i32),
                    i3::BGE => (rs1 as i32) >= (rs2 as i32),
                    i3::BLTU => rs1 < rs2,
                    i3::BGEU => rs1 >= rs2,
                    _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
                };
                if taken {
                    *next_pc = pc.wrapping_add(ir.imm as u32);
                }
            }
            i_op::OP_LOAD => {
                let addr = rs1.wrapping_add(ir.imm as u32);
                let value = match ir.funct3 {
                    i3::LB => bus.load1(addr).map_err(|_| Trap::LoadAccessFault(addr))? as i8 as i32 as u32,
                    i3::LH => bus.load2(addr).map_err(|_| Trap::LoadAccessFault(addr))? as i16 as i32 as u32,
                    i3::LW => bus.load4(addr).map_err(|_| Trap::LoadAccessFault(addr))?,
                    i3::LBU => u32::from(bus.load1(addr).map_err(|_| Trap::LoadAccessFault(addr))?),
                    i3::LHU => u32::from(bus.load2(addr).map_err(|_| Trap::LoadAccessFault(addr))?),
                    _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
                };
                self.gpr.write(ir.rd as u32, value);
            }
            i_op::OP_STORE => {
                let addr = rs1.wrapping_add(ir.imm as u32);
                self.invalidate_reservation_on_store(addr);
                match ir.funct3 {
                    i3::SB => bus.store1(addr, rs2 as u8).map_err(|_| Trap::StoreAccessFault(addr))?,
                    i3::SH => bus.store2(addr, rs2 as u16).map_err(|_| Trap::StoreAccessFault(addr))?,
                    i3::SW => bus.store4(addr, rs2).map_err(|_| Trap::StoreAccessFault(addr))?,
                    _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
                }
            }
            i_op::OP_IMM => {
                let imm = ir.imm as u32;
                let value = match ir.funct3 {
                    i3::ADD_SUB => rs1.wrapping_add(imm),
                    i3::SLT => u32::from((rs1 as i32) < (ir.imm)),
                    i3::SLTU => u32::from(rs1 < imm),
                    i3::XOR => rs1 ^ imm,
                    i3::OR => rs1 | imm,
                    i3::AND => rs1 & imm,
                    i3::SLL => rs1 << (imm & 0x1f),
                    i3::SRL_SRA => {
                        if ir.funct7 == i7::SRA {
                            ((rs1 as i32) >> (imm & 0x1f)) as u32
                        } else {
                            rs1 >> (imm & 0x1f)
                        }
                    }
                    _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
                };
                self.gpr.write(ir.rd as u32, value);
            }
            i_op::OP_REG if ir.funct7 == m_op::M_EXTENSION => {
                self.exec_m_ext(ir, rs1, rs2, pc)?;
            }
            i_op::OP_REG => {
                let value = match (ir.funct3, ir.funct7) {
                    (i3::ADD_SUB, i7::DEFAULT) => rs1.wrapping_add(rs2),
                    (i3::ADD_SUB, i7::SUB) => rs1.wrapping_sub(rs2),
                    (i3::SLL, _) => rs1 << (rs2 & 0x1f),
                    (i3::SLT, _) => u32::from((rs1 as i32) < (rs2 as i32)),
                    (i3::SLTU, _) => u32::from(rs1 < rs2),
                    (i3::XOR, _) => rs1 ^ rs2,
                    (i3::SRL_SRA, i7::SRA) => ((rs1 as i32) >> (rs2 & 0x1f)) as u32,
                    (i3::SRL_SRA, _) => rs1 >> (rs2 & 0x1f),
                    (i3::OR, _) => rs1 | rs2,
                    (i3::AND, _) => rs1 & rs2,
                    _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
                };
                self.gpr.write(ir.rd as u32, value);
            }
            i_op::OP_MISC_MEM => {
                // FENCE / FENCE.I: no-op, single hart, no pipeline.
            }
            a_op::OP_AMO => {
                self.exec_amo(bus, ir, rs1, rs2, pc)?;
            }
            sys_op::OP_SYSTEM => {
                return self.exec_system(bus, ir, pc, next_pc);
            }
            _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
        }
        Ok(Retire::Normal)
    }

    fn exec_m_ext(&mut self, ir: &crate::isa::Decoded, rs1: u32, rs2: u32, pc: u32) -> Result<(), Trap> {
        let (a, b) = (rs1 as i32, rs2 as i32);
        let value = match ir.funct3 {
            m3::MUL => rs1.wrapping_mul(rs2),
            m3::MULH => (((a as i64).wrapping_mul(b as i64)) >> 32) as u32,
            m3::MULHSU => (((a as i64).wrapping_mul(i64::from(rs2))) >> 32) as u32,
            m3::MULHU => ((u64::from(rs1).wrapping_mul(u64::from(rs2))) >> 32) as u32,
            m3::DIV => {
                if rs2 == 0 {
                    u32::MAX
                } else if a == i32::MIN && b == -1 {
                    a as u32
                } else {
                    (a.wrapping_div(b)) as u32
                }
            }
            m3::DIVU => {
                if rs2 == 0 {
                    u32::MAX
                } else {
                    rs1 / rs2
                }
            }
            m3::REM => {
                if rs2 == 0 {
                    rs1
                } else if a == i32::MIN && b == -1 {
                    0
                } else {
                    (a.wrapping_rem(b)) as u32
                }
            }
            m3::REMU => {
                if rs2 == 0 {
                    rs1
                } else {
                    rs1 % rs2
                }
            }
            _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
        };
        self.gpr.write(ir.rd as u32, value);
        Ok(())
    }

    fn exec_amo<B: Bus>(
        &mut self,
        bus: &mut B,
        ir: &crate::isa::Decoded,
        rs1: u32,
        rs2: u32,
        pc: u32,
    ) -> Result<(), Trap> {
        if ir.funct3 != a3::WIDTH_32 {
            return Err(Trap::IllegalInstruction(ir.raw, pc));
        }
        let addr = rs1;
        let op = ir.funct7 >> 2;

        if op == f5::LR {
            let value = bus.load4(addr).map_err(|_| Trap::LoadAccessFault(addr))?;
            self.set_reservation(addr);
            self.gpr.write(ir.rd as u32, value);
            return Ok(());
        }
        if op == f5::SC {
            let success = self.check_and_clear_reservation(addr);
            if success {
                bus.store4(addr, rs2).map_err(|_| Trap::StoreAccessFault(addr))?;
            }
            self.gpr.write(ir.rd as u32, u32::from(!success));
            return Ok(());
        }

        self.invalidate_reservation_on_store(addr);
        let old = bus.load4(addr).map_err(|_| Trap::LoadAccessFault(addr))?;
        let new = match op {
            f5::AMOSWAP => rs2,
            f5::AMOADD => old.wrapping_add(rs2),
            f5::AMOXOR => old ^ rs2,
            f5::AMOAND => old & rs2,
            f5::AMOOR => old | rs2,
            f5::AMOMIN => (old as i32).min(rs2 as i32) as u32,
            f5::AMOMAX => (old as i32).max(rs2 as i32) as u32,
            f5::AMOMINU => old.min(rs2),
            f5::AMOMAXU => old.max(rs2),
            _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
        };
        bus.store4(addr, new).map_err(|_| Trap::StoreAccessFault(addr))?;
        self.gpr.write(ir.rd as u32, old);
        Ok(())
    }

    fn exec_system<B: Bus>(
        &mut self,
        bus: &mut B,
        ir: &crate::isa::Decoded,
        pc: u32,
        next_pc: &mut u32,
    ) -> Result<Retire, Trap> {
        if ir.funct3 == 0 {
            return match ir.raw {
                sys_op::ECALL => Err(if self.mode() == crate::core::arch::PrivilegeMode::Machine {
                    Trap::EnvironmentCallFromMMode
                } else {
                    Trap::EnvironmentCallFromUMode
                }),
                sys_op::EBREAK => {
                    self.csrs.mcause = cause::exception::BREAKPOINT;
                    self.csrs.mepc = pc;
                    self.csrs.mtval = pc;
                    Ok(Retire::Benign)
                }
                sys_op::MRET => {
                    self.exec_mret();
                    *next_pc = self.pc;
                    Ok(Retire::Normal)
                }
                sys_op::WFI => {
                    self.wfi = true;
                    Ok(Retire::Normal)
                }
                _ => Err(Trap::IllegalInstruction(ir.raw, pc)),
            };
        }

        let csr = (ir.raw >> 20) & 0xFFF;
        let uses_imm = matches!(ir.funct3, sys_op::CSRRWI | sys_op::CSRRSI | sys_op::CSRRCI);
        let rs1_val = if uses_imm { ir.rs1 as u32 } else { self.gpr.read(ir.rs1 as u32) };

        let old = self.csr_read(bus, csr).ok_or(Trap::IllegalInstruction(ir.raw, pc))?;
        let new = match ir.funct3 {
            sys_op::CSRRW | sys_op::CSRRWI => rs1_val,
            sys_op::CSRRS | sys_op::CSRRSI => old | rs1_val,
            sys_op::CSRRC | sys_op::CSRRCI => old & !rs1_val,
            _ => return Err(Trap::IllegalInstruction(ir.raw, pc)),
        };
        if !self.csr_write(bus, csr, new) {
            return Err(Trap::IllegalInstruction(ir.raw, pc));
        }
        self.gpr.write(ir.rd as u32, old);
        Ok(Retire::Normal)
    }
}

impl StepOutcome {
    pub(crate) fn from_code(code: u32) -> Self {
        match code {
            0x5555 => Self::PowerOff,
            0x7777 => Self::Reset,
            other => Self::Unknown(other),
        }
    }
}
