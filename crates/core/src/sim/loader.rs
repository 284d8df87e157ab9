//! Loads a kernel image and a device tree blob into the backing store
//! before a run starts. Grounded on the teacher's `sim/loader.rs` plus
//! `examples/original_source/main/port-posix.c`'s `load_images`: kernel at
//! offset 0, DTB placed at the very top of RAM.

use crate::common::HostError;
use crate::soc::backing_store::BackingStore;

/// Writes `kernel` at offset 0 and `dtb` at `ram_size - dtb.len()` of
/// `store`. Returns the DTB's load address (relative to the start of RAM)
/// so the caller can hand it to [`crate::core::cpu::Hart::new`] as `a1`.
///
/// Only the kernel's own fit is a fatal condition, matching the original's
/// `load_images`: a DTB large enough to overlap the tail of the kernel is
/// written anyway, overwriting whatever of the kernel falls under it,
/// rather than being rejected outright.
///
/// # Errors
/// [`HostError::KernelTooLarge`] if `kernel` alone doesn't fit in
/// `ram_size`; any [`HostError`] the backing store itself raises while
/// writing.
pub fn load_images<S: BackingStore>(store: &mut S, ram_size: usize, kernel: &[u8], dtb: &[u8]) -> Result<u32, HostError> {
    if kernel.len() > ram_size {
        return Err(HostError::KernelTooLarge { kernel_len: kernel.len(), ram_size });
    }

    store.write(0, kernel)?;

    let dtb_addr = (ram_size - dtb.len()) as u32;
    store.write(dtb_addr, dtb)?;

    tracing::info!(
        kernel_len = kernel.len(),
        dtb_len = dtb.len(),
        dtb_addr = format!("{dtb_addr:#010x}"),
        "loaded guest images"
    );

    Ok(dtb_addr)
}
