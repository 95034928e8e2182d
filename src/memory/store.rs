//! Memory Store Module
//!
//! Bounded in-memory tier combining HashMap storage with LRU tracking and
//! count/cost limits.

use std::any::Any;
use std::collections::HashMap;

use crate::memory::{LruTracker, MemoryEntry};

// == Memory Store ==
/// Bounded key-value store for hot data.
///
/// Not internally synchronized; the cache wraps it in a mutex.
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, MemoryEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Maximum number of entries, 0 = unlimited
    count_limit: usize,
    /// Maximum summed cost, 0 = unlimited
    cost_limit: usize,
    /// Current summed cost
    total_cost: usize,
    /// Disk mutations queued per key and not yet run
    pending: HashMap<String, u32>,
    /// Disk clears queued and not yet run
    pending_clears: u32,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new MemoryStore.
    ///
    /// # Arguments
    /// * `count_limit` - Maximum number of entries (0 = unlimited)
    /// * `cost_limit` - Maximum summed cost in bytes (0 = unlimited)
    pub fn new(count_limit: usize, cost_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            count_limit,
            cost_limit,
            total_cost: 0,
            pending: HashMap::new(),
            pending_clears: 0,
        }
    }

    // == Set ==
    /// Stores a value with its cost, evicting least recently used entries
    /// until both limits hold.
    ///
    /// A value costlier than the whole cost limit is not retained, and any
    /// previous entry for the key is dropped. Returns the number of entries
    /// evicted.
    pub fn set<V: Any + Send + Sync>(&mut self, key: &str, value: V, cost: usize) -> usize {
        self.remove(key);

        if self.cost_limit > 0 && cost > self.cost_limit {
            return 0;
        }

        self.entries
            .insert(key.to_string(), MemoryEntry::new(value, cost));
        self.total_cost += cost;
        self.lru.touch(key);

        self.evict_over_limits()
    }

    fn evict_over_limits(&mut self) -> usize {
        let mut evicted = 0;
        while self.over_limits() {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_cost -= entry.cost;
                evicted += 1;
            }
        }
        evicted
    }

    fn over_limits(&self) -> bool {
        (self.count_limit > 0 && self.entries.len() > self.count_limit)
            || (self.cost_limit > 0 && self.total_cost > self.cost_limit)
    }

    // == Get ==
    /// Retrieves a clone of the value if present and stored as a `V`.
    ///
    /// A hit marks the key most recently used.
    pub fn get<V: Any + Clone>(&mut self, key: &str) -> Option<V> {
        let value = self.entries.get(key)?.downcast::<V>()?;
        self.lru.touch(key);
        Some(value)
    }

    // == Contains ==
    /// True if any value is held for the key. Does not affect LRU order.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Remove ==
    /// Removes an entry by key. Returns true if one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_cost -= entry.cost;
                self.lru.remove(key);
                true
            }
            None => false,
        }
    }

    // == Remove All ==
    /// Drops every entry. Returns how many were held.
    pub fn remove_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.total_cost = 0;
        count
    }

    // == Pending Disk Mutations ==
    /// Records a disk write or removal queued for `key`.
    pub fn begin_mutation(&mut self, key: &str) {
        *self.pending.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Records that a queued disk write or removal for `key` has run.
    pub fn finish_mutation(&mut self, key: &str) {
        if let Some(count) = self.pending.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(key);
            }
        }
    }

    /// Records a queued disk clear.
    pub fn begin_clear(&mut self) {
        self.pending_clears += 1;
    }

    /// Records that a queued disk clear has run.
    pub fn finish_clear(&mut self) {
        self.pending_clears = self.pending_clears.saturating_sub(1);
    }

    /// True when a value just read from disk for `key` is still current:
    /// no write, removal or clear was queued behind the read.
    pub fn can_repopulate(&self, key: &str) -> bool {
        self.pending_clears == 0 && !self.pending.contains_key(key)
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Total Cost ==
    pub fn total_cost(&self) -> usize {
        self.total_cost
    }
}
