//! Property-Based Tests for the Memory Tier
//!
//! Uses proptest to check the memory store against a simple model.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::memory::MemoryStore;

// == Test Configuration ==
const TEST_COUNT_LIMIT: usize = 100;

// == Strategies ==
/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,16}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}".prop_map(|s| s)
}

/// A single memory-tier operation
#[derive(Debug, Clone)]
enum MemoryOp {
    Set { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    RemoveAll,
}

fn memory_op_strategy() -> impl Strategy<Value = MemoryOp> {
    prop_oneof![
        4 => (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| MemoryOp::Set { key, value }),
        3 => valid_key_strategy().prop_map(|key| MemoryOp::Get { key }),
        2 => valid_key_strategy().prop_map(|key| MemoryOp::Remove { key }),
        1 => Just(MemoryOp::RemoveAll),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // With limits never reached, the store behaves exactly like a map.
    #[test]
    fn prop_unbounded_store_matches_map(ops in prop::collection::vec(memory_op_strategy(), 1..80)) {
        let mut store = MemoryStore::new(0, 0);
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                MemoryOp::Set { key, value } => {
                    let cost = value.len();
                    prop_assert_eq!(store.set(&key, value.clone(), cost), 0);
                    model.insert(key, value);
                }
                MemoryOp::Get { key } => {
                    prop_assert_eq!(store.get::<String>(&key), model.get(&key).cloned());
                }
                MemoryOp::Remove { key } => {
                    prop_assert_eq!(store.remove(&key), model.remove(&key).is_some());
                }
                MemoryOp::RemoveAll => {
                    prop_assert_eq!(store.remove_all(), model.len());
                    model.clear();
                }
            }
        }

        let expected_cost: usize = model.values().map(String::len).sum();
        prop_assert_eq!(store.len(), model.len());
        prop_assert_eq!(store.total_cost(), expected_cost);
    }

    // Any value the store still returns is the last one written for that key.
    #[test]
    fn prop_hits_are_never_stale(
        ops in prop::collection::vec(memory_op_strategy(), 1..80),
        count_limit in 1usize..8,
    ) {
        let mut store = MemoryStore::new(count_limit, 0);
        let mut latest: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                MemoryOp::Set { key, value } => {
                    store.set(&key, value.clone(), 1);
                    latest.insert(key, value);
                }
                MemoryOp::Get { key } => {
                    if let Some(hit) = store.get::<String>(&key) {
                        prop_assert_eq!(Some(&hit), latest.get(&key));
                    }
                }
                MemoryOp::Remove { key } => {
                    store.remove(&key);
                    latest.remove(&key);
                    prop_assert!(!store.contains(&key));
                }
                MemoryOp::RemoveAll => {
                    store.remove_all();
                    latest.clear();
                }
            }
        }
    }

    // Neither limit is ever exceeded after a set.
    #[test]
    fn prop_limits_enforced(
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..200
        ),
        count_limit in 1usize..50,
        cost_limit in 64usize..512,
    ) {
        let mut store = MemoryStore::new(count_limit, cost_limit);

        for (key, value) in entries {
            let cost = value.len();
            store.set(&key, value, cost);
            prop_assert!(store.len() <= count_limit, "count {} > {}", store.len(), count_limit);
            prop_assert!(store.total_cost() <= cost_limit, "cost {} > {}", store.total_cost(), cost_limit);
            // Values fit the cost limit, so the newest write is always retained
            prop_assert!(store.contains(&key));
        }
    }

    // Filling to capacity then inserting a new key evicts the least recently used key.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
    ) {
        let unique_keys: Vec<String> = initial_keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let mut store = MemoryStore::new(capacity, 0);
        for key in &unique_keys {
            store.set(key, format!("value_{}", key), 1);
        }

        // Touch the first key so the second becomes the eviction candidate
        let accessed = &unique_keys[0];
        let expected_evicted = &unique_keys[1];
        prop_assert!(store.get::<String>(accessed).is_some());

        prop_assert_eq!(store.set(&new_key, "new".to_string(), 1), 1);

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(!store.contains(expected_evicted));
        prop_assert!(store.contains(accessed));
        prop_assert!(store.contains(&new_key));
    }
}

// == Concurrent Access ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Shared behind a mutex, concurrent writers never leave the store over its limit
    // or with a value that was never written.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(memory_op_strategy(), 10..60)
    ) {
        use parking_lot::Mutex;
        use std::sync::Arc;

        let store = Arc::new(Mutex::new(MemoryStore::new(TEST_COUNT_LIMIT, 0)));
        let written: Arc<HashSet<String>> = Arc::new(
            operations
                .iter()
                .filter_map(|op| match op {
                    MemoryOp::Set { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect(),
        );

        let handles: Vec<_> = operations
            .chunks(10)
            .map(|chunk| {
                let store = Arc::clone(&store);
                let written = Arc::clone(&written);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for op in chunk {
                        let mut guard = store.lock();
                        match op {
                            MemoryOp::Set { key, value } => {
                                let cost = value.len();
                                guard.set(&key, value, cost);
                            }
                            MemoryOp::Get { key } => {
                                if let Some(value) = guard.get::<String>(&key) {
                                    assert!(written.contains(&value));
                                }
                            }
                            MemoryOp::Remove { key } => {
                                guard.remove(&key);
                            }
                            MemoryOp::RemoveAll => {
                                guard.remove_all();
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            prop_assert!(handle.join().is_ok(), "worker thread panicked");
        }

        prop_assert!(store.lock().len() <= TEST_COUNT_LIMIT);
    }
}
