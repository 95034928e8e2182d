//! Memory Tier Module
//!
//! Provides the bounded in-memory tier with LRU eviction under count and
//! cost limits. Entries may be dropped at any time, so a miss here never
//! means the key is absent.

mod entry;
mod lru;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::MemoryEntry;
pub use lru::LruTracker;
pub use store::MemoryStore;
