//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for memory-tier eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a strictly increasing tick:
/// - Lowest tick = Least recently used
/// - Highest tick = Most recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Tick of the last touch per key
    ticks: HashMap<String, u64>,
    /// Keys ordered by tick
    order: BTreeMap<u64, String>,
    /// Next tick to hand out
    clock: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, tracking it if new.
    pub fn touch(&mut self, key: &str) {
        let tick = self.clock;
        self.clock += 1;

        match self.ticks.get_mut(key) {
            Some(previous) => {
                if let Some(owned) = self.order.remove(&*previous) {
                    *previous = tick;
                    self.order.insert(tick, owned);
                }
            }
            None => {
                self.ticks.insert(key.to_string(), tick);
                self.order.insert(tick, key.to_string());
            }
        }
    }

    // == Remove ==
    /// Stops tracking a key. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    // == Contains ==
    pub fn contains(&self, key: &str) -> bool {
        self.ticks.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");
        lru.touch("key1");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&"key2".to_string()));
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        // front=[b, c, a]=back after these
        lru.touch("a");
        lru.touch("c");
        lru.touch("b");

        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert_eq!(lru.evict_oldest(), None);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.remove("key1");
        lru.remove("nonexistent");

        assert_eq!(lru.len(), 1);
        assert!(!lru.contains("key1"));
        assert_eq!(lru.evict_oldest(), Some("key2".to_string()));
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key1");
        lru.touch("key1");

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some("key1".to_string()));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.evict_oldest(), None);

        lru.touch("c");
        assert_eq!(lru.peek_oldest(), Some(&"c".to_string()));
    }
}
