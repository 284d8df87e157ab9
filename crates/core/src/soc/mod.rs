//! System-on-chip glue: the slow backing store, the MMIO bus adapter, and
//! the two devices it routes to.

pub mod backing_store;
pub mod bus;
pub mod devices;

pub use backing_store::{BackingStore, InMemoryStore};
pub use bus::MemoryBusAdapter;
