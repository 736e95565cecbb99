//! Cache Store Module
//!
//! Main cache engine: HashMap storage with size accounting, TTL expiration
//! and importance-weighted eviction when a write needs room.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::cache::{
    CacheEntry, CacheStats, CacheValue, CachedItem, Clock, DefaultSizeEstimator, EntryOptions,
    KeyFilter, Keys, SizeEstimator, StoredValue, SystemClock, MAX_IMPORTANCE, MIN_IMPORTANCE,
};
use crate::cache::stats::bytes_to_mib;
use crate::config::CacheConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{CacheError, Result};

// == Capabilities ==
/// External collaborators of a cache: time source, diagnostics and size model.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn DiagnosticSink>,
    pub estimator: Arc<dyn SizeEstimator>,
}

impl Capabilities {
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn with_estimator(mut self, estimator: impl SizeEstimator + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            estimator: Arc::new(DefaultSizeEstimator),
        }
    }
}

// == Set Outcome ==
/// Why a write was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The entry alone is larger than the cache
    TooLarge,
    /// Eviction could not free enough room
    NoRoom,
}

/// Result of a `set`. Rejection is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    Rejected(RejectReason),
}

impl SetOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SetOutcome::Stored)
    }
}

// == Cache Store ==
/// Bounded cache storage with TTL and importance-weighted eviction.
///
/// Every operation runs to completion on `&mut self`; share it across
/// threads through [`crate::MemCache`].
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    pub(super) entries: HashMap<String, CacheEntry>,
    /// Sum of `size_bytes` over all entries
    pub(super) current_size: u64,
    /// Activity counters
    pub(super) stats: CacheStats,
    pub(super) config: CacheConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) sink: Arc<dyn DiagnosticSink>,
    pub(super) estimator: Arc<dyn SizeEstimator>,
    next_sequence: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore using the wall clock, tracing diagnostics and
    /// the default size model.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_capabilities(config, Capabilities::default())
    }

    /// Creates a new CacheStore with the given collaborators.
    pub fn with_capabilities(config: CacheConfig, capabilities: Capabilities) -> Result<Self> {
        config.validate()?;

        let store = Self {
            entries: HashMap::new(),
            current_size: 0,
            stats: CacheStats::new(),
            config,
            clock: capabilities.clock,
            sink: capabilities.sink,
            estimator: capabilities.estimator,
            next_sequence: 0,
        };
        store.log_state("initialized", json!({}));
        Ok(store)
    }

    // == Set ==
    /// Stores a value under `key`, replacing any previous entry.
    ///
    /// If the cache is full, entries are evicted to make room. Entries larger
    /// than the whole cache, or that still do not fit after eviction, are
    /// dropped and reported as [`SetOutcome::Rejected`].
    ///
    /// # Errors
    /// Empty keys, importance outside 1..=10 and unserializable values.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<CacheValue>,
        mut options: EntryOptions,
    ) -> Result<SetOutcome> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Key cannot be empty".to_string(),
            ));
        }

        let importance = options.effective_importance();
        if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&importance) {
            return Err(CacheError::InvalidRequest(format!(
                "Importance must be between {} and {}, got {}",
                MIN_IMPORTANCE, MAX_IMPORTANCE, importance
            )));
        }

        let value = StoredValue::encode(&key, value.into())?;
        let meta = options.take_meta();
        let serialized_meta = meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| CacheError::Encode {
                key: key.clone(),
                source,
            })?;
        let size_bytes = self.estimator.estimate(&value, serialized_meta.as_deref());

        // Drop the previous entry first so both sizes are never counted together
        self.remove_entry(&key);

        if size_bytes > self.config.max_size_bytes {
            self.stats.record_rejection();
            return Ok(SetOutcome::Rejected(RejectReason::TooLarge));
        }

        if self.needs_eviction(size_bytes) {
            self.evict_for(size_bytes);

            if self.needs_eviction(size_bytes) {
                self.stats.record_rejection();
                return Ok(SetOutcome::Rejected(RejectReason::NoRoom));
            }
        }

        let now = self.clock.now_ms();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            size_bytes,
            created_at: now,
            expires_at: options.resolve_expiry(now),
            access_count: 0,
            importance,
            meta,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        self.current_size += size_bytes;
        self.entries.insert(key, entry);

        Ok(SetOutcome::Stored)
    }

    /// Serializes `value` and stores it as a structured entry.
    pub fn set_json<T: serde::Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
        options: EntryOptions,
    ) -> Result<SetOutcome> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| CacheError::Encode {
            key: key.clone(),
            source,
        })?;
        self.set(key, CacheValue::Json(value), options)
    }

    // == Get ==
    /// Retrieves a value by key and counts the read as an access.
    ///
    /// Returns None if the key is missing or expired; expired entries are
    /// removed.
    pub fn get(&mut self, key: &str) -> Result<Option<CacheValue>> {
        self.read(key, false)
    }

    /// Like [`CacheStore::get`] but leaves the access count untouched.
    pub fn peek(&mut self, key: &str) -> Result<Option<CacheValue>> {
        self.read(key, true)
    }

    /// Retrieves a value together with its metadata, counting an access.
    pub fn get_with_meta(&mut self, key: &str) -> Result<Option<CachedItem>> {
        self.read_with_meta(key, false)
    }

    /// Retrieves a value together with its metadata without counting an access.
    pub fn peek_with_meta(&mut self, key: &str) -> Result<Option<CachedItem>> {
        self.read_with_meta(key, true)
    }

    /// Retrieves a structured value and deserializes it into `T`.
    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(CacheValue::Json(value)) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| CacheError::Decode {
                    key: key.to_string(),
                    source,
                }),
            Some(other) => Err(CacheError::InvalidRequest(format!(
                "Value for key '{}' is {:?}, not json",
                key,
                other.kind()
            ))),
            None => Ok(None),
        }
    }

    fn read(&mut self, key: &str, peek: bool) -> Result<Option<CacheValue>> {
        match self.lookup(key, peek) {
            Some(entry) => entry.value.decode(&entry.key).map(Some),
            None => Ok(None),
        }
    }

    fn read_with_meta(&mut self, key: &str, peek: bool) -> Result<Option<CachedItem>> {
        match self.lookup(key, peek) {
            Some(entry) => Ok(Some(CachedItem {
                value: entry.value.decode(&entry.key)?,
                meta: entry.meta.clone(),
            })),
            None => Ok(None),
        }
    }

    /// Finds a live entry, removing it first if it has expired.
    fn lookup(&mut self, key: &str, peek: bool) -> Option<&CacheEntry> {
        self.retain_if_live(key);

        match self.entries.get_mut(key) {
            Some(entry) => {
                if !peek {
                    entry.access_count += 1;
                }
                self.stats.record_hit();
                Some(&*entry)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Returns true if a live entry exists. Expired entries are removed.
    /// Does not count as an access.
    pub fn has(&mut self, key: &str) -> bool {
        self.retain_if_live(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns true if an entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    // == Keys ==
    /// Iterates over live keys in arbitrary order, removing expired entries
    /// it comes across.
    pub fn keys(&mut self) -> Keys<'_> {
        Keys::new(self)
    }

    /// Iterates over live keys accepted by `filter`.
    pub fn keys_matching(&mut self, filter: KeyFilter) -> impl Iterator<Item = String> + '_ {
        self.keys().filter(move |key| filter.matches(key))
    }

    pub fn keys_with_prefix(&mut self, prefix: &str) -> impl Iterator<Item = String> + '_ {
        self.keys_matching(KeyFilter::Prefix(prefix.to_string()))
    }

    pub fn keys_with_suffix(&mut self, suffix: &str) -> impl Iterator<Item = String> + '_ {
        self.keys_matching(KeyFilter::Suffix(suffix.to_string()))
    }

    pub fn keys_containing(&mut self, text: &str) -> impl Iterator<Item = String> + '_ {
        self.keys_matching(KeyFilter::Contains(text.to_string()))
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_occupancy(self.entries.len(), self.current_size);
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache. Never evicts live entries.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.log_state("recurrent GC started", json!({}));

        let now = self.clock.now_ms();
        let removed = self.remove_expired(now);

        if removed > 0 {
            self.log_state("recurrent GC finished", json!({ "removed": removed }));
        }
        removed
    }

    // == Inspection ==
    /// Returns the raw entry for `key` without checking expiry or counting an access.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the total estimated size of all entries.
    pub fn size_bytes(&self) -> u64 {
        self.current_size
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Internals ==
    /// Removes an entry and releases its size.
    pub(super) fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_size -= entry.size_bytes;
        Some(entry)
    }

    /// Returns true if `key` holds a live entry; an expired one is removed.
    pub(crate) fn retain_if_live(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.remove_entry(key);
                self.stats.record_expiration();
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Removes every entry expired at `now`, returning how many were removed.
    pub(super) fn remove_expired(&mut self, now: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
            self.stats.record_expiration();
        }
        expired.len()
    }

    pub(crate) fn key_snapshot(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// True if adding one entry of `incoming` bytes would break a hard limit.
    pub(super) fn needs_eviction(&self, incoming: u64) -> bool {
        let over_count = self
            .config
            .max_count
            .is_some_and(|max| self.entries.len() + 1 > max);
        over_count || self.current_size + incoming > self.config.max_size_bytes
    }

    /// Sends `Cache [name] <step> - {fields, count, size_mib}` to the sink.
    pub(super) fn log_state(&self, step: &str, extra: Value) {
        let mut fields = match extra {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("count".to_string(), json!(self.entries.len()));
        fields.insert(
            "size_mib".to_string(),
            json!(format!("{:.2}", bytes_to_mib(self.current_size))),
        );
        self.sink.log(&format!(
            "Cache [{}] {} - {}",
            self.config.name,
            step,
            Value::Object(fields)
        ));
    }
}
