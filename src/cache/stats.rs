//! Cache Statistics Module
//!
//! Tracks cache occupancy and counters for hits, misses, evictions,
//! expirations and rejected writes.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache occupancy and activity counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache
    pub count: usize,
    /// Current total estimated size of all entries
    pub size_bytes: u64,
    /// Number of reads that found a live entry
    pub hits: u64,
    /// Number of reads that found nothing (missing or expired)
    pub misses: u64,
    /// Number of live entries removed to make room
    pub evictions: u64,
    /// Number of entries removed because their TTL had passed
    pub expirations: u64,
    /// Number of writes dropped for lack of capacity
    pub rejections: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total size in MiB, as reported in diagnostics.
    pub fn size_mib(&self) -> f64 {
        bytes_to_mib(self.size_bytes)
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    // == Update Occupancy ==
    /// Updates the entry count and total size.
    pub fn set_occupancy(&mut self, count: usize, size_bytes: u64) {
        self.count = count;
        self.size_bytes = size_bytes;
    }
}

pub(crate) fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
