//! Privilege levels. This interpreter only distinguishes Machine from User,
//! per `SPEC_FULL.md` §3 ("mode bits 0-1, value 3 = machine, 0 = user");
//! there is no Supervisor mode.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivilegeMode {
    User = 0,
    Machine = 3,
}

impl PrivilegeMode {
    #[must_use]
    pub const fn from_bits(val: u32) -> Self {
        match val & 0b11 {
            3 => Self::Machine,
            _ => Self::User,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "U",
            Self::Machine => "M",
        };
        write!(f, "{name}")
    }
}
