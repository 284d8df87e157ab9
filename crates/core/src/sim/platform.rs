//! The main run loop: wall-clock timekeeping, instruction budgeting, WFI
//! sleep, `SIGINT` handling, and reset-on-`0x7777`. Grounded on `app_main`
//! in `examples/original_source/main/uc-rv32ima.c` for the loop shape and
//! on the teacher's `crates/cli/src/main.rs` `cmd_run` for how the Rust
//! side wires timing and shutdown around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::core::cpu::{Hart, StepOutcome};
use crate::soc::backing_store::BackingStore;
use crate::soc::bus::MemoryBusAdapter;
use crate::soc::devices::uart::{ConsoleSink, KeyboardSource, Uart};
use crate::sim::loader;
use crate::stats::SimStats;

/// Exit status the platform glue reports to the process, once the guest
/// halts or a `SIGINT` is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    PowerOff,
    Interrupted,
}

static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: libc::c_int) {
    SIGINT_RECEIVED.store(true, Ordering::Relaxed);
}

/// Installs the process-wide `SIGINT` handler. Idempotent; safe to call
/// more than once (`libc::signal` just re-registers the same handler).
fn install_sigint_handler() {
    // SAFETY: `handle_sigint` only stores to an `AtomicBool`, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }
}

/// Owns everything a run needs across a reset: the hart, the bus (cache +
/// devices), the images to reload, and the guest RAM size they were loaded
/// against.
pub struct Platform<S, K, C> {
    hart: Hart,
    bus: MemoryBusAdapter<S, K, C>,
    config: Config,
    kernel: Arc<[u8]>,
    dtb: Arc<[u8]>,
    ram_size: u32,
    stats: SimStats,
}

impl<S: BackingStore, K: KeyboardSource, C: ConsoleSink> Platform<S, K, C> {
    /// Builds a fresh hart and loads `kernel`/`dtb` into `bus`'s backing
    /// store via [`loader::load_images`].
    ///
    /// # Errors
    /// Whatever [`loader::load_images`] returns.
    pub fn new(
        mut bus: MemoryBusAdapter<S, K, C>,
        config: Config,
        kernel: Arc<[u8]>,
        dtb: Arc<[u8]>,
    ) -> Result<Self, crate::common::HostError> {
        let ram_size = config.system.ram_size;
        let dtb_addr = loader::load_images(bus.cache_mut().store_mut(), ram_size as usize, &kernel, &dtb)?;
        let hart = Hart::new(crate::soc::bus::RAM_BASE, crate::soc::bus::RAM_BASE.wrapping_add(dtb_addr));
        Ok(Self { hart, bus, config, kernel, dtb, ram_size, stats: SimStats::default() })
    }

    #[must_use]
    pub const fn stats(&self) -> SimStats {
        self.stats
    }

    fn update_stats(&mut self) {
        let (hits, accesses) = self.bus.cache().stats();
        self.stats.cache_hits = hits;
        self.stats.cache_accesses = accesses;
        self.stats.instructions_retired = self.hart.cycle();
        self.stats.traps_taken = self.hart.traps_taken();
    }

    fn reset(&mut self) -> Result<(), crate::common::HostError> {
        let dtb_addr = loader::load_images(self.bus.cache_mut().store_mut(), self.ram_size as usize, &self.kernel, &self.dtb)?;
        self.hart = Hart::new(crate::soc::bus::RAM_BASE, crate::soc::bus::RAM_BASE.wrapping_add(dtb_addr));
        tracing::info!("guest requested reset");
        Ok(())
    }

    /// Runs until the guest powers off or `SIGINT` is observed.
    ///
    /// # Errors
    /// A [`crate::common::HostError`] surfaced while servicing a guest
    /// reset request (reloading images can fail the same way the initial
    /// load can).
    pub fn run(&mut self) -> Result<RunOutcome, crate::common::HostError> {
        install_sigint_handler();
        let mut last_tick = Instant::now();

        loop {
            if SIGINT_RECEIVED.load(Ordering::Relaxed) {
                self.bus.flush().ok();
                self.update_stats();
                return Ok(RunOutcome::Interrupted);
            }

            let now = Instant::now();
            let wall_delta_us = now.duration_since(last_tick).as_micros() as u64;
            last_tick = now;
            let guest_delta_us = wall_delta_us / self.config.general.time_divisor.max(1);

            match self.hart.step(&mut self.bus, guest_delta_us, self.config.general.max_instructions_per_step) {
                StepOutcome::Continue => {}
                StepOutcome::Benign => {
                    tracing::debug!(mcause = 3, "breakpoint reached, continuing");
                }
                StepOutcome::WaitForInterrupt => {
                    tracing::trace!("hart waiting for interrupt");
                    std::thread::sleep(std::time::Duration::from_millis(self.config.general.wfi_sleep_ms));
                }
                StepOutcome::PowerOff => {
                    self.bus.flush()?;
                    tracing::info!("guest requested power-off");
                    self.update_stats();
                    return Ok(RunOutcome::PowerOff);
                }
                StepOutcome::Reset => {
                    self.reset()?;
                }
                StepOutcome::Unknown(code) => {
                    tracing::warn!(code = format!("{code:#x}"), "unrecognised step exit code, continuing");
                }
            }
        }
    }
}
