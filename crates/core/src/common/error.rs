//! Guest-visible trap causes and host-fatal error types.

use thiserror::Error;

/// A synchronous exception or asynchronous interrupt recognised by the
/// machine-mode-only privileged subset this interpreter implements.
///
/// `Trap` never crosses [`crate::core::cpu::Hart::step`] as an `Err`; it is
/// constructed, turned into `mcause`/`mtval` via [`Trap::cause`] and
/// [`Trap::is_interrupt`], and dispatched into the guest's trap vector. It
/// derives [`std::error::Error`] purely so it composes with the rest of the
/// crate's error handling (logging, `?` inside helper functions that build
/// one), not because it is ever propagated to the host.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("instruction address misaligned at {0:#010x}")]
    InstructionAddressMisaligned(u32),
    #[error("instruction access fault at {0:#010x}")]
    InstructionAccessFault(u32),
    #[error("illegal instruction {0:#010x} at {1:#010x}")]
    IllegalInstruction(u32, u32),
    #[error("breakpoint at {0:#010x}")]
    Breakpoint(u32),
    #[error("load address misaligned at {0:#010x}")]
    LoadAddressMisaligned(u32),
    #[error("load access fault at {0:#010x}")]
    LoadAccessFault(u32),
    #[error("store address misaligned at {0:#010x}")]
    StoreAddressMisaligned(u32),
    #[error("store access fault at {0:#010x}")]
    StoreAccessFault(u32),
    #[error("environment call from U-mode")]
    EnvironmentCallFromUMode,
    #[error("environment call from M-mode")]
    EnvironmentCallFromMMode,
    #[error("machine software interrupt")]
    MachineSoftwareInterrupt,
    #[error("machine timer interrupt")]
    MachineTimerInterrupt,
    #[error("machine external interrupt")]
    MachineExternalInterrupt,
}

impl Trap {
    /// The value this trap contributes to `mcause`, without the interrupt
    /// bit (bit 31 on RV32) set.
    #[must_use]
    pub const fn cause(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned(_) => 0,
            Self::InstructionAccessFault(_) => 1,
            Self::IllegalInstruction(_, _) => 2,
            Self::Breakpoint(_) => 3,
            Self::LoadAddressMisaligned(_) => 4,
            Self::LoadAccessFault(_) => 5,
            Self::StoreAddressMisaligned(_) => 6,
            Self::StoreAccessFault(_) => 7,
            Self::EnvironmentCallFromUMode => 8,
            Self::EnvironmentCallFromMMode => 11,
            Self::MachineSoftwareInterrupt => 3,
            Self::MachineTimerInterrupt => 7,
            Self::MachineExternalInterrupt => 11,
        }
    }

    /// Whether this trap is an asynchronous interrupt rather than a
    /// synchronous exception.
    #[must_use]
    pub const fn is_interrupt(self) -> bool {
        matches!(
            self,
            Self::MachineSoftwareInterrupt
                | Self::MachineTimerInterrupt
                | Self::MachineExternalInterrupt
        )
    }

    /// The value this trap contributes to `mtval`: a faulting address for
    /// address-related traps, the raw instruction bits for illegal
    /// instructions, zero otherwise.
    #[must_use]
    pub const fn tval(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned(a)
            | Self::InstructionAccessFault(a)
            | Self::Breakpoint(a)
            | Self::LoadAddressMisaligned(a)
            | Self::LoadAccessFault(a)
            | Self::StoreAddressMisaligned(a)
            | Self::StoreAccessFault(a) => a,
            Self::IllegalInstruction(ir, _) => ir,
            _ => 0,
        }
    }

    /// The faulting program counter, where this trap carries one.
    #[must_use]
    pub const fn faulting_pc(self) -> Option<u32> {
        match self {
            Self::IllegalInstruction(_, pc) => Some(pc),
            _ => None,
        }
    }
}

/// Host-fatal errors: conditions the emulator cannot recover from and that
/// terminate the process after a diagnostic, per `SPEC_FULL.md` §7.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("backing store access out of bounds: addr={addr:#010x} len={len}")]
    OutOfBounds { addr: u32, len: usize },

    #[error("backing store io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("kernel image is {kernel_len} bytes, which exceeds ram size {ram_size}")]
    KernelTooLarge { kernel_len: usize, ram_size: usize },
}
