//! Record Store Module
//!
//! Reads and writes cache records through a storage driver with lazy expiry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::driver::Driver;
use crate::store::{CacheRecord, CacheStats};

// == Record Store ==
/// Expiry-aware access to records held by storage drivers.
///
/// Expiration is only checked on read. Expired records stay in the backend
/// until they are overwritten.
#[derive(Debug)]
pub struct RecordStore {
    /// Time source for TTL arithmetic
    clock: Arc<dyn Clock>,
    /// Activity counters
    stats: Mutex<CacheStats>,
}

impl RecordStore {
    // == Constructor ==
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // == Get ==
    /// Returns the live record stored under `key`.
    ///
    /// Absent, expired, expiry-less and unreadable records all come back as
    /// `None`; driver failures are logged, never returned.
    ///
    /// # Arguments
    /// * `driver` - Backend to read from
    /// * `key` - Namespaced storage key
    pub fn get(&self, driver: &Driver, key: &str) -> Option<CacheRecord> {
        let record = match driver.get_item(key) {
            Ok(record) => record,
            Err(e) => {
                warn!("Treating {} on {} as a miss: {}", key, driver.name(), e);
                let mut stats = self.stats.lock();
                stats.record_storage_error();
                stats.record_miss();
                return None;
            }
        };

        let Some(record) = record else {
            debug!("Cache miss for {}", key);
            self.stats.lock().record_miss();
            return None;
        };

        if !record.is_live(self.now_ms()) {
            debug!("Cache record for {} has expired", key);
            self.stats.lock().record_expired();
            return None;
        }

        debug!("Cache hit for {}", key);
        self.stats.lock().record_hit();
        Some(record)
    }

    // == Has ==
    /// Returns true if a live record exists under `key`.
    pub fn has(&self, driver: &Driver, key: &str) -> bool {
        self.get(driver, key).is_some()
    }

    // == Set ==
    /// Writes `data` under `key`, expiring `ttl` from now.
    ///
    /// A zero TTL writes a record that is already expired.
    ///
    /// # Arguments
    /// * `driver` - Backend to write to
    /// * `key` - Namespaced storage key
    /// * `data` - Value to store; `None` stores no data
    /// * `ttl` - Time to live
    pub fn set(&self, driver: &Driver, key: &str, data: Option<Value>, ttl: Duration) {
        let record = CacheRecord::new(data, ttl, self.now_ms());

        match driver.set_item(key, &record) {
            Ok(()) => {
                debug!("Stored {} on {} for {:?}", key, driver.name(), ttl);
                self.stats.lock().record_write();
            }
            Err(e) => {
                warn!("Failed to store {} on {}: {}", key, driver.name(), e);
                self.stats.lock().record_storage_error();
            }
        }
    }

    /// Adds `count` fan-out deliveries to the statistics.
    pub fn record_notifications(&self, count: usize) {
        self.stats.lock().record_notifications(count);
    }

    // == Stats ==
    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::driver::{LocalStorageDriver, MemoryDriver, StorageDriver};
    use crate::error::{CacheError, Result};
    use serde_json::json;

    fn store_with_clock() -> (RecordStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (RecordStore::new(clock.clone()), clock)
    }

    #[test]
    fn test_store_set_and_get() {
        let (store, _) = store_with_clock();
        let driver = Driver::memory();

        store.set(&driver, "_cache_k", Some(json!("v")), Duration::from_secs(60));
        let record = store.get(&driver, "_cache_k").unwrap();

        assert_eq!(record.data, Some(json!("v")));
        assert_eq!(record.expires_at, Some(1_060_000));
        assert!(store.has(&driver, "_cache_k"));
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (store, _) = store_with_clock();
        let driver = Driver::memory();

        assert!(store.get(&driver, "_cache_none").is_none());
        assert!(!store.has(&driver, "_cache_none"));
    }

    #[test]
    fn test_store_zero_ttl_reads_as_absent() {
        let (store, _) = store_with_clock();
        let driver = Driver::memory();

        store.set(&driver, "_cache_k", Some(json!(1)), Duration::ZERO);
        assert!(store.get(&driver, "_cache_k").is_none());
    }

    #[test]
    fn test_store_lazy_expiration_keeps_entry() {
        let (store, clock) = store_with_clock();
        let backend = Arc::new(MemoryDriver::new());
        let driver = Driver::from_arc(backend.clone());

        store.set(&driver, "_cache_k", Some(json!("v")), Duration::from_secs(1));
        assert!(store.has(&driver, "_cache_k"));

        clock.advance(Duration::from_secs(2));

        assert!(store.get(&driver, "_cache_k").is_none());
        assert_eq!(backend.len(), 1);
        assert!(backend.raw("_cache_k").is_some());
    }

    #[test]
    fn test_store_overwrite_resets_expiry() {
        let (store, clock) = store_with_clock();
        let driver = Driver::memory();

        store.set(&driver, "_cache_k", Some(json!(1)), Duration::from_secs(1));
        clock.advance(Duration::from_millis(900));
        store.set(&driver, "_cache_k", Some(json!(2)), Duration::from_secs(1));
        clock.advance(Duration::from_millis(900));

        assert_eq!(store.get(&driver, "_cache_k").unwrap().data, Some(json!(2)));
    }

    #[test]
    fn test_store_record_without_expiry_is_miss() {
        let (store, _) = store_with_clock();
        let backend = Arc::new(MemoryDriver::new());
        backend
            .set_item(
                "_cache_k",
                &CacheRecord {
                    data: Some(json!("x")),
                    expires_at: None,
                },
            )
            .unwrap();
        let driver = Driver::from_arc(backend);

        assert!(store.get(&driver, "_cache_k").is_none());
    }

    #[test]
    fn test_store_corrupt_record_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalStorageDriver::open(dir.path().join("s.json")).unwrap());
        backend.set_raw("_cache_k", "{broken").unwrap();
        let driver = Driver::from_arc(backend);
        let (store, _) = store_with_clock();

        assert!(store.get(&driver, "_cache_k").is_none());
        assert_eq!(store.stats().storage_errors, 1);
    }

    #[test]
    fn test_store_write_failure_is_swallowed() {
        struct ReadOnly;
        impl StorageDriver for ReadOnly {
            fn set_item(&self, _key: &str, _record: &CacheRecord) -> Result<()> {
                Err(CacheError::InvalidConfig("read only".to_string()))
            }
            fn get_item(&self, _key: &str) -> Result<Option<CacheRecord>> {
                Ok(None)
            }
        }

        let (store, _) = store_with_clock();
        let driver = Driver::new(ReadOnly);

        store.set(&driver, "_cache_k", Some(json!(1)), Duration::from_secs(5));
        let stats = store.stats();
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.storage_errors, 1);
    }

    #[test]
    fn test_store_stats() {
        let (store, clock) = store_with_clock();
        let driver = Driver::memory();

        store.set(&driver, "_cache_a", Some(json!(1)), Duration::from_secs(1));
        store.get(&driver, "_cache_a"); // hit
        store.get(&driver, "_cache_b"); // miss
        clock.advance(Duration::from_secs(1));
        store.get(&driver, "_cache_a"); // expired

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.writes, 1);
    }
}
