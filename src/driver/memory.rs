//! Volatile in-process driver.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::StorageDriver;
use crate::error::Result;
use crate::store::CacheRecord;

/// Keeps records in a process-local map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    entries: RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored record whether or not it has expired.
    pub fn raw(&self, key: &str) -> Option<CacheRecord> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StorageDriver for MemoryDriver {
    fn set_item(&self, key: &str, record: &CacheRecord) -> Result<()> {
        self.entries.write().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<CacheRecord>> {
        Ok(self.raw(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
