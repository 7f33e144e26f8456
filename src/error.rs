//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Cache operations fail open,
//! so these errors only surface from constructors and storage drivers.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the durable store failed
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted text for a key could not be parsed as a record
    #[error("Corrupt record for key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record or configuration could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
