//! Subscriber Registry
//!
//! Fans a value change for one (driver, key) pair out to every binding
//! observing it.
//!
//! # Design
//!
//! The registry is a map of driver identity to storage key to callbacks.
//! Driver handles are compared by [`DriverId`], never by value, so hold a
//! [`Driver`] stably and clone it rather than recreating it.
//!
//! Callbacks are collected under the lock and invoked after it is released,
//! so a callback may subscribe, unsubscribe or trigger another fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::driver::{Driver, DriverId};

// == Update ==
/// Where a propagated value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// The host changed the property itself
    External,
    /// The cache pushed the value into the property
    Cache,
}

/// A value travelling through the fan-out path, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// New value; `None` marks an invalidation
    pub value: Option<Value>,
    pub origin: UpdateOrigin,
}

impl Update {
    /// An update pushed by the cache.
    pub fn from_cache(value: Option<Value>) -> Self {
        Self {
            value,
            origin: UpdateOrigin::Cache,
        }
    }
}

/// Callback invoked with every update for a subscribed key.
pub type Callback = Arc<dyn Fn(&Update) + Send + Sync>;

type SubscriberId = u64;
type KeySpace = HashMap<String, Vec<(SubscriberId, Callback)>>;

#[derive(Default)]
struct RegistryInner {
    next_id: SubscriberId,
    spaces: HashMap<DriverId, KeySpace>,
}

impl RegistryInner {
    fn remove(&mut self, driver: DriverId, key: &str, id: SubscriberId) -> bool {
        let Some(space) = self.spaces.get_mut(&driver) else {
            return false;
        };
        let Some(set) = space.get_mut(key) else {
            return false;
        };

        let before = set.len();
        set.retain(|(sid, _)| *sid != id);
        let removed = set.len() != before;

        if set.is_empty() {
            space.remove(key);
        }
        if space.is_empty() {
            self.spaces.remove(&driver);
        }
        removed
    }
}

// == Subscriber Registry ==
/// Two-level driver → key → callback-set registry.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Subscribe ==
    /// Adds `callback` to the set for (`driver`, `key`).
    ///
    /// Subscribing the same callback (by `Arc` identity) twice is a no-op that
    /// returns a handle to the existing entry.
    ///
    /// # Arguments
    /// * `driver` - Driver whose key space is observed
    /// * `key` - Namespaced storage key
    /// * `callback` - Invoked on every `notify` for this pair
    pub fn subscribe(&self, driver: &Driver, key: &str, callback: Callback) -> Subscription {
        let mut inner = self.inner.write();

        let existing = inner
            .spaces
            .get(&driver.id())
            .and_then(|space| space.get(key))
            .and_then(|set| {
                set.iter()
                    .find(|(_, cb)| same_callback(cb, &callback))
                    .map(|(id, _)| *id)
            });

        let id = match existing {
            Some(id) => id,
            None => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner
                    .spaces
                    .entry(driver.id())
                    .or_default()
                    .entry(key.to_string())
                    .or_default()
                    .push((id, callback));
                debug!("Subscribed #{} to {} on {}", id, key, driver.id());
                id
            }
        };

        Subscription {
            registry: Arc::downgrade(&self.inner),
            driver: driver.id(),
            key: key.to_string(),
            id,
        }
    }

    // == Notify ==
    /// Invokes every callback registered for (`driver`, `key`).
    ///
    /// Order is unspecified. Returns the number of callbacks invoked.
    pub fn notify(&self, driver: &Driver, key: &str, update: &Update) -> usize {
        let callbacks: Vec<Callback> = {
            let inner = self.inner.read();
            inner
                .spaces
                .get(&driver.id())
                .and_then(|space| space.get(key))
                .map(|set| set.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        for callback in &callbacks {
            callback(update);
        }

        if !callbacks.is_empty() {
            debug!("Notified {} subscribers of {}", callbacks.len(), key);
        }
        callbacks.len()
    }

    /// Number of callbacks registered for (`driver`, `key`).
    pub fn subscriber_count(&self, driver: &Driver, key: &str) -> usize {
        self.inner
            .read()
            .spaces
            .get(&driver.id())
            .and_then(|space| space.get(key))
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SubscriberRegistry")
            .field("drivers", &inner.spaces.len())
            .finish()
    }
}

fn same_callback(a: &Callback, b: &Callback) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// == Subscription ==
/// Handle to one registry entry.
///
/// Dropping the handle leaves the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<RwLock<RegistryInner>>,
    driver: DriverId,
    key: String,
    id: SubscriberId,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn driver(&self) -> DriverId {
        self.driver
    }

    /// Removes the callback. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let removed = inner.write().remove(self.driver, &self.key, self.id);
        if removed {
            debug!("Unsubscribed #{} from {}", self.id, self.key);
        }
        removed
    }
}
