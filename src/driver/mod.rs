//! Storage Driver Module
//!
//! Pluggable key/value backends that hold cache records.
//!
//! # Drivers
//! - `LocalStorageDriver` - durable, file-backed; the default
//! - `MemoryDriver` - volatile, in-process

mod local;
mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::store::CacheRecord;

pub use local::LocalStorageDriver;
pub use memory::MemoryDriver;

// == Storage Driver Trait ==
/// Capability to read and write records by storage key.
///
/// Implementations may be volatile; callers must not assume durability.
pub trait StorageDriver: Send + Sync {
    /// Writes `record` under `key`, replacing any previous record.
    fn set_item(&self, key: &str, record: &CacheRecord) -> Result<()>;

    /// Reads the record stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Short label used in log output.
    fn name(&self) -> &str {
        "custom"
    }
}

// == Driver Identity ==
/// Process-unique identity of a [`Driver`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(u64);

static NEXT_DRIVER_ID: AtomicU64 = AtomicU64::new(1);

impl DriverId {
    fn next() -> Self {
        DriverId(NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver#{}", self.0)
    }
}

// == Driver Handle ==
/// Shared handle to a storage driver.
///
/// Identity is fixed when the handle is created: clones compare equal, while
/// two handles wrapping the same backend do not. Keep a handle around and clone
/// it; recreating one from the backend yields a different subscriber space.
#[derive(Clone)]
pub struct Driver {
    id: DriverId,
    inner: Arc<dyn StorageDriver>,
}

impl Driver {
    /// Wraps a driver in a new handle.
    pub fn new(driver: impl StorageDriver + 'static) -> Self {
        Self::from_arc(Arc::new(driver))
    }

    /// Wraps an already shared driver in a new handle with a fresh identity.
    pub fn from_arc(inner: Arc<dyn StorageDriver>) -> Self {
        Self {
            id: DriverId::next(),
            inner,
        }
    }

    /// Shortcut for a handle over a fresh [`MemoryDriver`].
    pub fn memory() -> Self {
        Self::new(MemoryDriver::new())
    }

    pub fn id(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub(crate) fn set_item(&self, key: &str, record: &CacheRecord) -> Result<()> {
        self.inner.set_item(key, record)
    }

    pub(crate) fn get_item(&self, key: &str) -> Result<Option<CacheRecord>> {
        self.inner.get_item(key)
    }
}

impl PartialEq for Driver {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Driver {}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("id", &self.id)
            .field("name", &self.inner.name())
            .finish()
    }
}
