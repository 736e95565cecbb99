//! Bounded Memcache - an embeddable in-memory cache
//!
//! Bounded by entry count and estimated size, with per-entry TTL,
//! importance-weighted eviction and a periodic sweep of expired entries.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handle;
pub mod tasks;

pub use cache::{CacheStore, CacheValue, EntryOptions, SetOutcome};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use handle::{MemCache, MemCacheBuilder};
pub use tasks::spawn_cleanup_task;
