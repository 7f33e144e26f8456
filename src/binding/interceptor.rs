//! Binding Interceptor
//!
//! Per-property state machine that seeds a reactive value from the cache,
//! writes later changes through, and accepts values pushed by the cache.
//!
//! # Lifecycle
//! `Uninitialized` → `Seeded` (on bind) → `Syncing` (after the first effect pass)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::config::BindingConfig;
use super::host::{Effect, Getter, ReactiveHost, Setter};
use crate::api::Cache;
use crate::driver::Driver;
use crate::registry::{Callback, Subscription, Update, UpdateOrigin};

/// Lifecycle state of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    /// Not yet attached to a property
    Uninitialized,
    /// Initial value chosen, write-through effect not yet run
    Seeded,
    /// Every further change is persisted
    Syncing,
}

#[derive(Debug)]
struct BindingState {
    phase: BindingPhase,
    /// Whether the next externally driven pass is persisted
    should_save: bool,
    /// Value the cache pushed into the property that the effect has not seen yet
    echo: Option<Option<Value>>,
    /// Last value written to or observed on the property by this binding
    current: Option<Value>,
    active: bool,
}

impl BindingState {
    fn new() -> Self {
        Self {
            phase: BindingPhase::Uninitialized,
            should_save: false,
            echo: None,
            current: None,
            active: true,
        }
    }

    /// Tags a value observed by the effect with where it came from.
    fn origin_of(&mut self, value: &Option<Value>) -> UpdateOrigin {
        match self.echo.take() {
            Some(echo) if echo == *value => UpdateOrigin::Cache,
            _ => UpdateOrigin::External,
        }
    }
}

// == Interceptor ==
/// An unbound cached property: a configuration waiting for its host hook.
///
/// Obtained from [`Cache::interceptor`].
pub struct Interceptor {
    cache: Cache,
    config: BindingConfig,
}

impl Interceptor {
    pub fn new(cache: Cache, config: BindingConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    // == On Bind ==
    /// Attaches the interceptor to a reactive property.
    ///
    /// Resolves key, TTL and driver, subscribes to fan-out, seeds the property
    /// from a live record (or keeps `initial` and persists it on the first
    /// pass) and registers the write-through effect with `host`.
    ///
    /// # Arguments
    /// * `initial` - The property's own initial value
    /// * `read` - Reads the property
    /// * `write` - Replaces the property
    /// * `path` - Structural path of the property, the key when no alias is set
    /// * `host` - Effect scheduler of the reactive framework
    pub fn on_bind(
        self,
        initial: Option<Value>,
        read: Getter,
        write: Setter,
        path: &str,
        host: &dyn ReactiveHost,
    ) -> BoundBinding {
        let Interceptor { cache, config } = self;
        let resolved = config.resolve(path, &cache);
        let state = Arc::new(Mutex::new(BindingState::new()));

        let subscription = cache.registry().subscribe(
            &resolved.driver,
            &resolved.key,
            apply_update(state.clone(), write.clone()),
        );

        let (seed, should_save) = match cache.store().get(&resolved.driver, &resolved.key) {
            Some(record) => (record.data, false),
            None => (initial, true),
        };
        debug!(
            "Bound {} to {} (seeded from {})",
            path,
            resolved.key,
            if should_save { "default" } else { "cache" }
        );

        {
            let mut st = state.lock();
            st.phase = BindingPhase::Seeded;
            st.should_save = should_save;
            st.current = seed.clone();
        }

        // The first effect pass must observe the seed, not the host's placeholder.
        write(seed.clone());

        host.effect(write_through(
            cache,
            state.clone(),
            read,
            resolved.driver.clone(),
            resolved.key.clone(),
            resolved.ttl,
        ));

        BoundBinding {
            initial: seed,
            key: resolved.key,
            ttl: resolved.ttl,
            driver: resolved.driver,
            state,
            subscription: Some(subscription),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("config", &self.config)
            .finish()
    }
}

/// Subscriber callback: pushes a cache value into the property.
///
/// Must not read the property through the host, or the effect that calls
/// `Cache::set` would start tracking it.
fn apply_update(state: Arc<Mutex<BindingState>>, write: Setter) -> Callback {
    Arc::new(move |update: &Update| {
        {
            let mut st = state.lock();
            if !st.active {
                return;
            }
            if update.origin == UpdateOrigin::Cache && st.current != update.value {
                st.echo = Some(update.value.clone());
            }
            st.current = update.value.clone();
        }
        write(update.value.clone());
    })
}

/// Effect: persists externally driven values of the property.
fn write_through(
    cache: Cache,
    state: Arc<Mutex<BindingState>>,
    read: Getter,
    driver: Driver,
    key: String,
    ttl: Duration,
) -> Effect {
    Box::new(move || {
        let value = read();

        let persist = {
            let mut st = state.lock();
            if !st.active {
                return;
            }
            let origin = st.origin_of(&value);
            st.current = value.clone();
            let persist = origin == UpdateOrigin::External && st.should_save;
            st.should_save = true;
            st.phase = BindingPhase::Syncing;
            persist
        };

        if persist {
            cache.store().set(&driver, &key, value, ttl);
        }
    })
}

// == Bound Binding ==
/// A property attached to the cache.
pub struct BoundBinding {
    initial: Option<Value>,
    key: String,
    ttl: Duration,
    driver: Driver,
    state: Arc<Mutex<BindingState>>,
    subscription: Option<Subscription>,
}

impl BoundBinding {
    /// The value the property was seeded with.
    pub fn initial(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    /// Namespaced storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn phase(&self) -> BindingPhase {
        self.state.lock().phase
    }

    /// Detaches the binding: no more fan-out, no more write-through.
    pub fn unbind(mut self) {
        self.state.lock().active = false;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        debug!("Unbound {}", self.key);
    }
}

impl fmt::Debug for BoundBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundBinding")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("driver", &self.driver)
            .field("phase", &self.phase())
            .finish()
    }
}
