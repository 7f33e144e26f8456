//! Property-Based Tests for the Store Module
//!
//! Uses proptest to check the read/write/expiry properties of the cache.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::Cache;
use crate::binding::BindingConfig;
use crate::clock::ManualClock;
use crate::config::Config;
use crate::driver::{Driver, MemoryDriver};
use crate::registry::{Callback, Update};
use crate::store::namespace;

const START_MS: i64 = 1_700_000_000_000;

// == Strategies ==
/// Generates logical keys, including separators found in property paths
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.]{1,32}".prop_map(|s| s)
}

/// Generates JSON payloads of a few shapes
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        "[a-zA-Z0-9 ]{0,64}".prop_map(|s| json!(s)),
        prop::collection::vec(any::<i32>(), 0..8).prop_map(|v| json!(v)),
        Just(Value::Null),
    ]
}

fn test_cache() -> (Cache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let cache = Cache::with_clock(Config::default(), Driver::memory(), clock.clone());
    (cache, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* key, value and positive TTL, a set followed by a get on the
    // same driver returns the stored value.
    #[test]
    fn prop_set_then_get(
        key in key_strategy(),
        value in value_strategy(),
        ttl_secs in 1u64..86_400
    ) {
        let (cache, _) = test_cache();
        let driver = Driver::memory();

        cache.set(&key, value.clone(), Duration::from_secs(ttl_secs), Some(&driver));
        prop_assert_eq!(cache.get(&key, Some(&driver)), Some(value));
    }

    // *For any* key and value, a zero TTL record is never served.
    #[test]
    fn prop_zero_ttl_is_expired(key in key_strategy(), value in value_strategy()) {
        let (cache, _) = test_cache();

        cache.set(&key, value, Duration::ZERO, None);
        prop_assert_eq!(cache.get(&key, None), None);
    }

    // *For any* key, invalidate makes the key read as a miss and reaches each
    // subscriber exactly once with no value.
    #[test]
    fn prop_invalidate(key in key_strategy(), value in value_strategy()) {
        let (cache, _) = test_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: Callback = Arc::new(move |update: &Update| {
            assert!(update.value.is_none());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.set(&key, value, Duration::from_secs(60), None);
        cache.subscribe(&key, None, callback);
        cache.invalidate(&key, None);

        prop_assert_eq!(cache.get(&key, None), None);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // *For any* set of distinct logical keys, namespaced keys stay distinct.
    #[test]
    fn prop_namespace_is_injective(keys in prop::collection::hash_set(key_strategy(), 1..50)) {
        let encoded: HashSet<String> = keys.iter().map(|k| namespace(k)).collect();
        prop_assert_eq!(encoded.len(), keys.len());
    }

    // *For any* deadline in the past, the resolved TTL is zero.
    #[test]
    fn prop_valid_until_past_floors_to_zero(ago_ms in 0i64..10_000_000) {
        let (cache, _) = test_cache();
        let deadline = chrono::DateTime::from_timestamp_millis(START_MS - ago_ms).unwrap();
        let config = BindingConfig::builder().valid_until(deadline).build();

        prop_assert_eq!(config.resolve("k", &cache).ttl, Duration::ZERO);
    }
}

// Separate block for simulated-time expiry
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // *For any* record written with a 1 s TTL, reading it 2 s later is a miss,
    // while the backend still holds the entry.
    #[test]
    fn prop_expiry_is_read_lazy(key in key_strategy(), value in value_strategy()) {
        let (cache, clock) = test_cache();
        let backend = Arc::new(MemoryDriver::new());
        let driver = Driver::from_arc(backend.clone());

        cache.set(&key, value.clone(), Duration::from_secs(1), Some(&driver));
        prop_assert_eq!(cache.get(&key, Some(&driver)), Some(value));

        clock.advance(Duration::from_secs(2));

        prop_assert_eq!(cache.get(&key, Some(&driver)), None);
        prop_assert!(backend.raw(&namespace(&key)).is_some(), "Expired entry should stay in storage");
    }
}
