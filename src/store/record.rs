//! Cache Record Module
//!
//! Defines the persisted `{data, expires_at}` pair.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::clock::duration_ms;

// == Cache Record ==
/// A single persisted value with its absolute expiration time.
///
/// `data` of `None` stands for an undefined value (the tombstone payload) and is
/// omitted from the serialized text. A JSON `null` round-trips as `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// The stored value
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub data: Option<Value>,
    /// Expiration timestamp (Unix milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record that expires `ttl` after `now_ms`.
    ///
    /// # Arguments
    /// * `data` - The value to store
    /// * `ttl` - Time to live; zero yields an already-expired record
    /// * `now_ms` - Current Unix time in milliseconds
    pub fn new(data: Option<Value>, ttl: Duration, now_ms: i64) -> Self {
        Self {
            data,
            expires_at: Some(now_ms.saturating_add(duration_ms(ttl))),
        }
    }

    /// Creates the record `invalidate` writes: no data, expiring immediately.
    pub fn tombstone(now_ms: i64) -> Self {
        Self::new(None, Duration::ZERO, now_ms)
    }

    // == Is Live ==
    /// Checks if the record may still be served.
    ///
    /// A record without an expiration timestamp is never live. Otherwise it is
    /// live strictly before `expires_at`, so a zero TTL is expired on the first read.
    pub fn is_live(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms < expires,
            None => false,
        }
    }

    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms).max(0))
    }
}

/// Keeps an explicit `null` distinct from a missing field.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
