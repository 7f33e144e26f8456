//! Binding Module
//!
//! Wires reactive properties to the cache through an interceptor.
//!
//! A framework adapter implements [`ReactiveHost`] and calls
//! [`Interceptor::on_bind`] once per cached property. [`SignalHost`] is a
//! self-contained adapter for code without a framework.

mod config;
mod host;
mod interceptor;

pub use config::{BindingConfig, BindingConfigBuilder, Lifetime, ResolvedBinding};
pub use host::{Effect, Getter, ReactiveHost, Setter, Signal, SignalHost};
pub use interceptor::{BindingPhase, BoundBinding, Interceptor};
