//! The slow memory tier behind the cache.
//!
//! `SPEC_FULL.md` §4.1: `read`/`write` of arbitrary byte ranges at byte
//! addresses; errors are fatal. Grounded on `crates/hardware/src/soc/
//! memory/buffer.rs`'s mmap-with-`Vec`-fallback `DramBuffer`, and on
//! `examples/original_source/main/port-posix.c`'s file-backed `psram_read`/
//! `psram_write`, which confirms this tier is meant to be addressed by byte
//! range rather than through a direct pointer.

use crate::common::HostError;

/// The contract the cache issues line-fill/writeback transactions against.
/// Not required to be thread-safe; the cache never calls it concurrently
/// (`SPEC_FULL.md` §5).
pub trait BackingStore {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), HostError>;
    fn write(&mut self, addr: u32, buf: &[u8]) -> Result<(), HostError>;
    fn len(&self) -> usize;
}

/// A fixed-capacity in-process backing store. On Unix this is backed by an
/// anonymous `mmap` (avoiding the up-front zeroing cost of a `Vec` for
/// multi-megabyte guest RAM); elsewhere it falls back to a `Vec<u8>`.
pub struct InMemoryStore {
    #[cfg(unix)]
    ptr: *mut u8,
    #[cfg(not(unix))]
    buf: Vec<u8>,
    size: usize,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").field("size", &self.size).finish()
    }
}

// SAFETY: `ptr` is an owned, page-aligned mmap allocation of `size` bytes
// with no other owner; `InMemoryStore` hands out no references that outlive
// `&mut self` borrows, so moving it across threads (it is never shared
// concurrently, per `SPEC_FULL.md` §5) is sound.
#[cfg(unix)]
unsafe impl Send for InMemoryStore {}

impl InMemoryStore {
    /// # Panics
    /// Panics if `size` is zero or the platform allocator fails; both are
    /// startup misconfiguration, not a runtime condition this type recovers
    /// from.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "backing store size must be nonzero");

        #[cfg(unix)]
        {
            // SAFETY: `size` is nonzero and checked above; MAP_ANON|MAP_PRIVATE
            // with PROT_READ|PROT_WRITE gives us a zero-filled, writable
            // region owned solely by this struct until `Drop::drop` unmaps it.
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANON,
                    -1,
                    0,
                )
            };
            assert!(ptr != libc::MAP_FAILED, "mmap failed for backing store");
            Self { ptr: ptr.cast::<u8>(), size }
        }
        #[cfg(not(unix))]
        {
            Self { buf: vec![0u8; size], size }
        }
    }

    #[cfg(unix)]
    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `size` bytes for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    #[cfg(unix)]
    fn as_slice_mut(&mut self) -> &mut [u8] {
        // SAFETY: `ptr` is valid for `size` bytes, and `&mut self` ensures
        // exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    #[cfg(not(unix))]
    fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    #[cfg(not(unix))]
    fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

#[cfg(unix)]
impl Drop for InMemoryStore {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`size` are exactly the region `mmap` returned.
        unsafe {
            libc::munmap(self.ptr.cast::<libc::c_void>(), self.size);
        }
    }
}

impl BackingStore for InMemoryStore {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), HostError> {
        let addr = addr as usize;
        let end = addr.checked_add(buf.len()).filter(|&e| e <= self.size);
        let Some(end) = end else {
            return Err(HostError::OutOfBounds { addr: addr as u32, len: buf.len() });
        };
        buf.copy_from_slice(&self.as_slice()[addr..end]);
        Ok(())
    }

    fn write(&mut self, addr: u32, buf: &[u8]) -> Result<(), HostError> {
        let a = addr as usize;
        let end = a.checked_add(buf.len()).filter(|&e| e <= self.size);
        let Some(end) = end else {
            return Err(HostError::OutOfBounds { addr, len: buf.len() });
        };
        self.as_slice_mut()[a..end].copy_from_slice(buf);
        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let mut store = InMemoryStore::new(4096);
        store.write(100, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        store.read(100, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut store = InMemoryStore::new(16);
        let mut buf = [0u8; 4];
        assert!(store.read(14, &mut buf).is_err());
    }
}
