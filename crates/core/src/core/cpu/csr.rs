//! CSR read/write dispatch: the interpreter's own machine CSRs first, the
//! platform's "other CSR" hook (debug/keyboard CSRs) second.

use super::Hart;
use crate::bus::Bus;

impl Hart {
    pub(crate) fn csr_read<B: Bus>(&mut self, bus: &mut B, csr: u32) -> Option<u32> {
        self.csrs.read(csr).or_else(|| bus.other_csr_read(csr))
    }

    pub(crate) fn csr_write<B: Bus>(&mut self, bus: &mut B, csr: u32, value: u32) -> bool {
        if self.csrs.write(csr, value) {
            true
        } else {
            bus.other_csr_write(csr, value)
        }
    }
}
