//! Reactive Cache - time-expiring persistence for reactive state
//!
//! Backs selected reactive properties with cache records held in a pluggable
//! key/value driver. Bindings seed from a live record, write later changes
//! through, and receive values pushed by `Cache::set` and `Cache::invalidate`.
//!
//! ```
//! use reactive_cache::{BindingConfig, Cache, Config, Driver, SignalHost};
//! use std::time::Duration;
//!
//! let cache = Cache::with_driver(Config::default(), Driver::memory());
//! let host = SignalHost::new();
//! let (todos, _binding) = host.bind(
//!     cache.interceptor(BindingConfig::builder().alias("todos").ttl(Duration::from_secs(300)).build()),
//!     "app.todos",
//!     Some(serde_json::json!([])),
//! );
//!
//! cache.set("todos", serde_json::json!(["write docs"]), Duration::from_secs(300), None);
//! assert_eq!(todos.peek(), Some(serde_json::json!(["write docs"])));
//! ```

pub mod api;
pub mod binding;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod registry;
pub mod store;

pub use api::Cache;
pub use binding::{BindingConfig, BindingPhase, BoundBinding, Interceptor, ReactiveHost, SignalHost};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use driver::{Driver, LocalStorageDriver, MemoryDriver, StorageDriver};
pub use error::{CacheError, Result};
pub use registry::{Subscription, Update, UpdateOrigin};
pub use store::{namespace, CacheRecord, CacheStats};
