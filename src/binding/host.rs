//! Reactive Host
//!
//! The contract a reactive framework offers the interceptor, plus
//! [`SignalHost`], a minimal dependency-tracking implementation of it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::interceptor::{BoundBinding, Interceptor};

/// Reads the current value of a reactive property.
pub type Getter = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

/// Replaces the value of a reactive property.
pub type Setter = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// Callback re-run by the host whenever a dependency it read changes.
pub type Effect = Box<dyn FnMut() + Send>;

// == Host Contract ==
/// Effect scheduling offered by a reactive framework.
pub trait ReactiveHost {
    /// Registers `effect`, re-running it whenever a reactive value it reads changes.
    fn effect(&self, effect: Effect);
}

type EffectId = usize;

#[derive(Default)]
struct HostInner {
    effects: Mutex<Vec<Arc<Mutex<Effect>>>>,
    /// Stack of effects currently running, innermost last
    tracking: Mutex<Vec<EffectId>>,
}

impl HostInner {
    fn run(&self, id: EffectId) {
        let Some(slot) = self.effects.lock().get(id).cloned() else {
            return;
        };
        // An effect that triggers itself is not re-entered.
        let Some(mut effect) = slot.try_lock() else {
            return;
        };

        self.tracking.lock().push(id);
        (&mut **effect)();
        self.tracking.lock().pop();
    }

    fn current(&self) -> Option<EffectId> {
        self.tracking.lock().last().copied()
    }
}

// == Signal Host ==
/// Synchronous single-scheduler host.
///
/// Effects run once when registered and again, synchronously, whenever a
/// [`Signal`] they read is set to a different value.
#[derive(Clone, Default)]
pub struct SignalHost {
    inner: Arc<HostInner>,
}

impl SignalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reactive value owned by this host.
    pub fn signal(&self, initial: Option<Value>) -> Signal {
        Signal {
            host: Arc::downgrade(&self.inner),
            state: Arc::new(RwLock::new(SignalState {
                value: initial,
                dependents: BTreeSet::new(),
            })),
        }
    }

    /// Declares a cached property at `path`.
    ///
    /// Creates the backing signal and runs the interceptor against it, the way
    /// a framework would on component setup. The interceptor writes the seed.
    pub fn bind(
        &self,
        interceptor: Interceptor,
        path: &str,
        initial: Option<Value>,
    ) -> (Signal, BoundBinding) {
        let signal = self.signal(initial.clone());
        let bound = interceptor.on_bind(initial, signal.getter(), signal.setter(), path, self);
        (signal, bound)
    }

    pub fn effect_count(&self) -> usize {
        self.inner.effects.lock().len()
    }
}

impl ReactiveHost for SignalHost {
    fn effect(&self, effect: Effect) {
        let id = {
            let mut effects = self.inner.effects.lock();
            effects.push(Arc::new(Mutex::new(effect)));
            effects.len() - 1
        };
        self.inner.run(id);
    }
}

impl fmt::Debug for SignalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHost")
            .field("effects", &self.effect_count())
            .finish()
    }
}

// == Signal ==
struct SignalState {
    value: Option<Value>,
    dependents: BTreeSet<EffectId>,
}

/// A reactive value. Clones share the same value.
#[derive(Clone)]
pub struct Signal {
    host: Weak<HostInner>,
    state: Arc<RwLock<SignalState>>,
}

impl Signal {
    /// Returns the value, recording the running effect as a dependent.
    pub fn get(&self) -> Option<Value> {
        let running = self.host.upgrade().and_then(|host| host.current());
        match running {
            Some(id) => {
                let mut state = self.state.write();
                state.dependents.insert(id);
                state.value.clone()
            }
            None => self.peek(),
        }
    }

    /// Returns the value without tracking.
    pub fn peek(&self) -> Option<Value> {
        self.state.read().value.clone()
    }

    /// Replaces the value and re-runs dependents. Equal values are ignored.
    pub fn set(&self, value: Option<Value>) {
        let dependents: Vec<EffectId> = {
            let mut state = self.state.write();
            if state.value == value {
                return;
            }
            state.value = value;
            state.dependents.iter().copied().collect()
        };

        if let Some(host) = self.host.upgrade() {
            for id in dependents {
                host.run(id);
            }
        }
    }

    pub fn getter(&self) -> Getter {
        let signal = self.clone();
        Arc::new(move || signal.get())
    }

    pub fn setter(&self) -> Setter {
        let signal = self.clone();
        Arc::new(move |value: Option<Value>| signal.set(value))
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("value", &self.peek()).finish()
    }
}
