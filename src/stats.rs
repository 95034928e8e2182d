//! Cache Statistics Module
//!
//! Tracks per-tier hits, misses, evictions and disk write outcomes.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics across both tiers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered by the memory tier
    pub memory_hits: u64,
    /// Lookups that missed memory and were answered by the disk tier
    pub disk_hits: u64,
    /// Lookups that found nothing in either tier
    pub misses: u64,
    /// Memory entries dropped to stay within limits
    pub evictions: u64,
    /// Disk writes that completed
    pub disk_writes: u64,
    /// Disk writes that failed
    pub write_failures: u64,
    /// Files on disk that could not be decoded
    pub corrupt_reads: u64,
    /// Current number of entries in the memory tier
    pub memory_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate over both tiers.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_disk_write(&mut self) {
        self.disk_writes += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }

    pub fn record_corrupt_read(&mut self) {
        self.corrupt_reads += 1;
    }

    // == Update Entry Count ==
    pub fn set_memory_entries(&mut self, count: usize) {
        self.memory_entries = count;
    }
}
