//! Configuration Module
//!
//! Handles loading and managing cache configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Prefix prepended to every logical key before it reaches a storage driver.
pub const DEFAULT_KEY_PREFIX: &str = "_cache_";

/// TTL in seconds for bindings that do not set one.
pub const DEFAULT_TTL_SECS: u64 = 60;

/// Cache configuration parameters.
///
/// Every field has a sensible default, so a config file only needs to list
/// the values it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespace prefix for storage keys
    pub key_prefix: String,
    /// Default TTL in seconds for bindings without an explicit lifetime
    pub default_ttl: u64,
    /// File backing the default durable storage driver
    pub storage_path: PathBuf,
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy of this config persisting to `path`.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Returns a copy of this config with a different default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl.as_secs();
        self
    }

    /// Returns the default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Rejects configurations that would break key namespacing.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(CacheError::InvalidConfig(
                "key_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL_SECS,
            storage_path: std::env::temp_dir()
                .join("reactive_cache")
                .join("local_storage.json"),
        }
    }
}
