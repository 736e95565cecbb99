//! Cache Module
//!
//! Provides an in-memory cache bounded by entry count and estimated size, with
//! TTL expiration and importance-weighted eviction.

mod clock;
mod entry;
mod eviction;
mod keys;
mod sizing;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheValue, CachedItem, EntryOptions, StoredValue, ValueKind};
pub use eviction::{EvictionPhase, EvictionReport};
pub use keys::{KeyFilter, Keys, SharedKeys};
pub use sizing::{DefaultSizeEstimator, SizeEstimator};
pub use stats::CacheStats;
pub use store::{CacheStore, Capabilities, RejectReason, SetOutcome};

// == Public Constants ==
/// Default maximum total size in bytes
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 50 * 1024 * 1024; // 50 MiB

/// Default interval of the background sweep in milliseconds
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;

/// Default fraction of the limits eviction aims for
pub const DEFAULT_LOW_WATER_MARK: f64 = 0.9;

/// Fixed per-entry overhead added to every size estimate
pub const ENTRY_OVERHEAD_BYTES: u64 = 100;

/// Lowest importance level, evicted first
pub const MIN_IMPORTANCE: u8 = 1;

/// Highest importance level
pub const MAX_IMPORTANCE: u8 = 10;

/// Importance given to entries stored without an explicit one
pub const DEFAULT_IMPORTANCE: u8 = MIN_IMPORTANCE;

/// Highest importance level still evicted down to the low water mark.
/// Levels above it are only evicted as far as needed to fit a new entry.
pub const RECYCLABLE_MAX_IMPORTANCE: u8 = 5;
