//! Cache API
//!
//! Process-wide imperative operations over the record store and subscriber
//! registry, plus the factory for property interceptors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::binding::{BindingConfig, Interceptor};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::driver::{Driver, LocalStorageDriver};
use crate::error::Result;
use crate::registry::{Callback, SubscriberRegistry, Subscription, Update};
use crate::store::{CacheStats, KeyCodec, RecordStore};

struct CacheInner {
    config: Config,
    codec: KeyCodec,
    store: RecordStore,
    registry: SubscriberRegistry,
    default_driver: RwLock<Driver>,
}

// == Cache ==
/// Handle to a cache: its default driver, record store and subscribers.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

static GLOBAL: Lazy<Cache> = Lazy::new(|| {
    let config = Config::default();
    Cache::new(config.clone()).unwrap_or_else(|e| {
        warn!("Durable storage unavailable, falling back to memory: {}", e);
        Cache::with_driver(config, Driver::memory())
    })
});

impl Cache {
    // == Constructors ==
    /// Creates a cache whose default driver persists to `config.storage_path`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let driver = Driver::new(LocalStorageDriver::open(&config.storage_path)?);
        Ok(Self::with_driver(config, driver))
    }

    /// Creates a cache over an explicit default driver.
    pub fn with_driver(config: Config, driver: Driver) -> Self {
        Self::with_clock(config, driver, Arc::new(SystemClock))
    }

    /// Creates a cache with an explicit default driver and time source.
    pub fn with_clock(config: Config, driver: Driver, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                codec: KeyCodec::new(config.key_prefix.clone()),
                config,
                store: RecordStore::new(clock),
                registry: SubscriberRegistry::new(),
                default_driver: RwLock::new(driver),
            }),
        }
    }

    /// The lazily created process-wide cache.
    ///
    /// Uses the default [`Config`]; if its durable store cannot be opened the
    /// global cache runs on a [`crate::driver::MemoryDriver`] instead.
    pub fn global() -> &'static Cache {
        &GLOBAL
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.inner.codec
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.store.now_ms()
    }

    pub(crate) fn store(&self) -> &RecordStore {
        &self.inner.store
    }

    pub(crate) fn registry(&self) -> &SubscriberRegistry {
        &self.inner.registry
    }

    /// Driver used when an operation or binding does not name one.
    pub fn default_driver(&self) -> Driver {
        self.inner.default_driver.read().clone()
    }

    /// Replaces the default driver for operations and bindings that start later.
    pub fn set_default_driver(&self, driver: Driver) {
        debug!("Default driver is now {:?}", driver);
        *self.inner.default_driver.write() = driver;
    }

    fn resolve_driver(&self, driver: Option<&Driver>) -> Driver {
        driver.cloned().unwrap_or_else(|| self.default_driver())
    }

    // == Get ==
    /// Returns the cached value for `key`, or None on a miss.
    ///
    /// # Arguments
    /// * `key` - Logical key, namespaced before lookup
    /// * `driver` - Backend to read; the default driver when None
    pub fn get(&self, key: &str, driver: Option<&Driver>) -> Option<Value> {
        let driver = self.resolve_driver(driver);
        self.inner
            .store
            .get(&driver, &self.inner.codec.encode(key))
            .and_then(|record| record.data)
    }

    /// Like [`Cache::get`], deserializing into `T`. A value of the wrong shape is a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str, driver: Option<&Driver>) -> Option<T> {
        let value = self.get(key, driver)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!("Cached value for {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Returns true if a live record exists for `key`.
    pub fn has(&self, key: &str, driver: Option<&Driver>) -> bool {
        let driver = self.resolve_driver(driver);
        self.inner.store.has(&driver, &self.inner.codec.encode(key))
    }

    // == Set ==
    /// Stores `data` for `ttl` and pushes it to every binding on `key`.
    ///
    /// # Arguments
    /// * `key` - Logical key
    /// * `data` - Value to store
    /// * `ttl` - Time to live; zero stores an already-expired record
    /// * `driver` - Backend to write; the default driver when None
    pub fn set(&self, key: &str, data: impl Into<Value>, ttl: Duration, driver: Option<&Driver>) {
        let driver = self.resolve_driver(driver);
        let key = self.inner.codec.encode(key);
        let data = data.into();

        self.inner.store.set(&driver, &key, Some(data.clone()), ttl);
        self.fan_out(&driver, &key, Some(data));
    }

    // == Invalidate ==
    /// Writes a tombstone for `key` and pushes `None` to every binding on it.
    pub fn invalidate(&self, key: &str, driver: Option<&Driver>) {
        let driver = self.resolve_driver(driver);
        let key = self.inner.codec.encode(key);

        self.inner.store.set(&driver, &key, None, Duration::ZERO);
        self.fan_out(&driver, &key, None);
    }

    fn fan_out(&self, driver: &Driver, key: &str, value: Option<Value>) {
        let delivered = self
            .inner
            .registry
            .notify(driver, key, &Update::from_cache(value));
        self.inner.store.record_notifications(delivered);
    }

    // == Subscribe ==
    /// Registers `callback` for updates pushed to `key` by `set` and `invalidate`.
    pub fn subscribe(&self, key: &str, driver: Option<&Driver>, callback: Callback) -> Subscription {
        let driver = self.resolve_driver(driver);
        self.inner
            .registry
            .subscribe(&driver, &self.inner.codec.encode(key), callback)
    }

    // == Interceptor ==
    /// Creates an interceptor for one reactive property.
    pub fn interceptor(&self, config: BindingConfig) -> Interceptor {
        Interceptor::new(self.clone(), config)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.inner.store.stats()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.inner.config)
            .field("default_driver", &self.default_driver())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::UpdateOrigin;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    fn cache() -> (Cache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = Cache::with_clock(Config::default(), Driver::memory(), clock.clone());
        (cache, clock)
    }

    fn recorder() -> (Callback, Arc<Mutex<Vec<Update>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: Callback = Arc::new(move |update: &Update| sink.lock().push(update.clone()));
        (callback, seen)
    }

    #[test]
    fn test_set_then_get() {
        let (cache, _) = cache();
        cache.set("user", json!({"name": "ada"}), Duration::from_secs(60), None);

        assert_eq!(cache.get("user", None), Some(json!({"name": "ada"})));
        assert!(cache.has("user", None));
    }

    #[test]
    fn test_zero_ttl_reads_as_miss() {
        let (cache, _) = cache();
        cache.set("user", "x", Duration::ZERO, None);
        assert_eq!(cache.get("user", None), None);
    }

    #[test]
    fn test_invalidate_notifies_once_with_none() {
        let (cache, _) = cache();
        let (callback, seen) = recorder();
        cache.set("k", 1, Duration::from_secs(60), None);
        cache.subscribe("k", None, callback);

        cache.invalidate("k", None);

        assert_eq!(cache.get("k", None), None);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, None);
        assert_eq!(seen[0].origin, UpdateOrigin::Cache);
    }

    #[test]
    fn test_explicit_driver_is_separate() {
        let (cache, _) = cache();
        let other = Driver::memory();

        cache.set("k", "default", Duration::from_secs(60), None);
        cache.set("k", "other", Duration::from_secs(60), Some(&other));

        assert_eq!(cache.get("k", None), Some(json!("default")));
        assert_eq!(cache.get("k", Some(&other)), Some(json!("other")));
    }

    #[test]
    fn test_set_default_driver() {
        let (cache, _) = cache();
        let replacement = Driver::memory();
        cache.set_default_driver(replacement.clone());

        cache.set("k", 1, Duration::from_secs(60), None);
        assert_eq!(cache.default_driver(), replacement);
        assert_eq!(cache.get("k", Some(&replacement)), Some(json!(1)));
    }

    #[test]
    fn test_get_as_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            name: String,
        }

        let (cache, _) = cache();
        cache.set("user", json!({"name": "ada"}), Duration::from_secs(60), None);

        assert_eq!(
            cache.get_as::<User>("user", None),
            Some(User {
                name: "ada".to_string()
            })
        );
        assert_eq!(cache.get_as::<u32>("user", None), None);
    }

    #[test]
    fn test_lazy_expiry_through_api() {
        let (cache, clock) = cache();
        cache.set("k", 1, Duration::from_secs(1), None);
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("k", None), None);
    }

    #[test]
    fn test_custom_prefix() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = Arc::new(crate::driver::MemoryDriver::new());
        let config = Config {
            key_prefix: "app:".to_string(),
            ..Config::default()
        };
        let cache = Cache::with_clock(config, Driver::from_arc(backend.clone()), clock);

        cache.set("k", 1, Duration::from_secs(5), None);
        assert!(backend.raw("app:k").is_some());
        assert!(backend.raw("_cache_k").is_none());
    }

    #[test]
    fn test_new_opens_durable_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_storage_path(dir.path().join("store.json"));

        let cache = Cache::new(config.clone()).unwrap();
        cache.set("k", "durable", Duration::from_secs(60), None);
        drop(cache);

        let reopened = Cache::new(config).unwrap();
        assert_eq!(reopened.get("k", None), Some(json!("durable")));
    }

    #[test]
    fn test_stats_count_notifications() {
        let (cache, _) = cache();
        let (a, _) = recorder();
        let (b, _) = recorder();
        cache.subscribe("k", None, a);
        cache.subscribe("k", None, b);

        cache.set("k", 1, Duration::from_secs(1), None);
        assert_eq!(cache.stats().notifications, 2);
        assert_eq!(cache.stats().writes, 1);
    }

    #[test]
    fn test_global_is_shared() {
        let a = Cache::global() as *const Cache;
        let b = Cache::global() as *const Cache;
        assert_eq!(a, b);
    }
}
