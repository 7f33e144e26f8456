//! Store Module
//!
//! Cache records, key namespacing and the expiry-aware record store.

mod key;
mod record;
mod record_store;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use key::{namespace, KeyCodec};
pub use record::CacheRecord;
pub use record_store::RecordStore;
pub use stats::CacheStats;
