//! Binding Configuration
//!
//! Immutable per-binding settings and the builder that produces them.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::api::Cache;
use crate::driver::Driver;

// == Lifetime ==
/// How long a binding's records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// A fixed duration from each write
    For(Duration),
    /// Until an absolute point in time, converted to a duration at bind time
    Until(DateTime<Utc>),
}

impl Lifetime {
    /// Converts to a TTL relative to `now_ms`, floored at zero.
    pub fn resolve(&self, now_ms: i64) -> Duration {
        match self {
            Lifetime::For(ttl) => *ttl,
            Lifetime::Until(deadline) => {
                let remaining = deadline.timestamp_millis().saturating_sub(now_ms).max(0);
                Duration::from_millis(remaining as u64)
            }
        }
    }
}

// == Binding Config ==
/// Settings for one binding, fixed once built.
#[derive(Debug, Clone, Default)]
pub struct BindingConfig {
    alias: Option<String>,
    lifetime: Option<Lifetime>,
    driver: Option<Driver>,
}

impl BindingConfig {
    pub fn builder() -> BindingConfigBuilder {
        BindingConfigBuilder::default()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn lifetime(&self) -> Option<Lifetime> {
        self.lifetime
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Resolves key, TTL and driver for a property at `path`.
    ///
    /// An empty alias falls back to the path. Missing settings take the
    /// cache's defaults at the moment of the call.
    pub fn resolve(&self, path: &str, cache: &Cache) -> ResolvedBinding {
        let logical = self
            .alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(path);

        let ttl = match self.lifetime {
            Some(lifetime) => lifetime.resolve(cache.now_ms()),
            None => cache.config().default_ttl(),
        };

        ResolvedBinding {
            key: cache.codec().encode(logical),
            ttl,
            driver: self
                .driver
                .clone()
                .unwrap_or_else(|| cache.default_driver()),
        }
    }
}

/// Effective settings of an active binding.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// Namespaced storage key
    pub key: String,
    pub ttl: Duration,
    pub driver: Driver,
}

// == Builder ==
/// Fluent builder for [`BindingConfig`].
///
/// Every setter overwrites; `ttl` and `valid_until` share one slot, so
/// whichever is called last decides the lifetime.
#[derive(Debug, Default)]
pub struct BindingConfigBuilder {
    config: BindingConfig,
}

impl BindingConfigBuilder {
    /// Stores the property under `name` instead of its path.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.config.alias = Some(name.into());
        self
    }

    /// Keeps each write for `ttl`.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.lifetime = Some(Lifetime::For(ttl));
        self
    }

    /// Keeps writes until `deadline`. A past deadline means records expire at once.
    pub fn valid_until(mut self, deadline: DateTime<Utc>) -> Self {
        self.config.lifetime = Some(Lifetime::Until(deadline));
        self
    }

    /// Persists through `driver` instead of the cache's default driver.
    pub fn driver(mut self, driver: Driver) -> Self {
        self.config.driver = Some(driver);
        self
    }

    pub fn build(self) -> BindingConfig {
        self.config
    }
}
