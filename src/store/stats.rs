//! Cache Statistics Module
//!
//! Tracks record store activity including hits, misses and expired reads.

use serde::Serialize;

// == Cache Stats ==
/// Tracks record store metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live record
    pub hits: u64,
    /// Number of reads that found nothing usable (absent, expired or corrupt)
    pub misses: u64,
    /// Subset of misses caused by an expired record
    pub expired: u64,
    /// Number of records written
    pub writes: u64,
    /// Number of driver reads or writes that failed
    pub storage_errors: u64,
    /// Number of subscriber callbacks invoked by fan-out
    pub notifications: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Expired ==
    /// Increments the expired counter. An expired read counts as a miss too.
    pub fn record_expired(&mut self) {
        self.expired += 1;
        self.misses += 1;
    }

    // == Record Write ==
    /// Increments the write counter.
    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    // == Record Storage Error ==
    /// Increments the storage error counter.
    pub fn record_storage_error(&mut self) {
        self.storage_errors += 1;
    }

    // == Record Notifications ==
    /// Adds `count` delivered subscriber callbacks.
    pub fn record_notifications(&mut self, count: usize) {
        self.notifications += count as u64;
    }
}
