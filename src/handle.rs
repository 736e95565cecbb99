//! Shared Cache Handle
//!
//! Thread-safe, cloneable front of a [`CacheStore`] that also owns the
//! background sweep.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{
    CacheEntry, CacheStats, CacheStore, CacheValue, CachedItem, Capabilities, Clock,
    EntryOptions, KeyFilter, SetOutcome, SharedKeys, SizeEstimator,
};
use crate::config::CacheConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::tasks::{spawn_cleanup_task, ScheduledTask, Scheduler, ThreadScheduler, TokioScheduler};

// == Builder ==
/// Configures the collaborators of a [`MemCache`] before it starts.
#[derive(Debug)]
pub struct MemCacheBuilder {
    config: CacheConfig,
    capabilities: Capabilities,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl MemCacheBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.capabilities = self.capabilities.with_clock(clock);
        self
    }

    pub fn sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.capabilities = self.capabilities.with_sink(sink);
        self
    }

    pub fn size_estimator(mut self, estimator: impl SizeEstimator + 'static) -> Self {
        self.capabilities = self.capabilities.with_estimator(estimator);
        self
    }

    /// Timer used for the background sweep. Defaults to the current tokio
    /// runtime if there is one, a dedicated thread otherwise.
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Creates the cache and, unless the interval is 0, starts the sweep.
    pub fn build(self) -> Result<MemCache> {
        let cleanup_interval = self.config.cleanup_interval();
        let store = CacheStore::with_capabilities(self.config, self.capabilities)?;
        let scheduler = self.scheduler.unwrap_or_else(default_scheduler);

        let cache = MemCache {
            inner: Arc::new(Inner {
                store: Arc::new(Mutex::new(store)),
                scheduler,
                sweep: Mutex::new(None),
                cleanup_interval,
            }),
        };
        cache.start_auto_cleanup()?;
        Ok(cache)
    }
}

fn default_scheduler() -> Arc<dyn Scheduler> {
    match TokioScheduler::current() {
        Ok(scheduler) => Arc::new(scheduler),
        Err(_) => Arc::new(ThreadScheduler),
    }
}

// == Mem Cache ==
/// A bounded in-memory cache that can be shared between threads.
///
/// Clones refer to the same cache. Every call takes a single lock around the
/// store, as does each sweep run. Dropping the last clone stops the sweep.
#[derive(Debug, Clone)]
pub struct MemCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<Mutex<CacheStore>>,
    scheduler: Arc<dyn Scheduler>,
    sweep: Mutex<Option<Box<dyn ScheduledTask>>>,
    cleanup_interval: Option<Duration>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(mut sweep) = self.sweep.get_mut().take() {
            sweep.cancel();
        }
    }
}

impl MemCache {
    /// Creates a cache with default collaborators.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> MemCacheBuilder {
        MemCacheBuilder {
            config,
            capabilities: Capabilities::default(),
            scheduler: None,
        }
    }

    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<CacheValue>,
        options: EntryOptions,
    ) -> Result<SetOutcome> {
        self.inner.store.lock().set(key, value, options)
    }

    pub fn set_json<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        options: EntryOptions,
    ) -> Result<SetOutcome> {
        self.inner.store.lock().set_json(key, value, options)
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.inner.store.lock().get(key)
    }

    pub fn peek(&self, key: &str) -> Result<Option<CacheValue>> {
        self.inner.store.lock().peek(key)
    }

    pub fn get_with_meta(&self, key: &str) -> Result<Option<CachedItem>> {
        self.inner.store.lock().get_with_meta(key)
    }

    pub fn peek_with_meta(&self, key: &str) -> Result<Option<CachedItem>> {
        self.inner.store.lock().peek_with_meta(key)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.inner.store.lock().get_json(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.store.lock().has(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.store.lock().delete(key)
    }

    pub fn clear(&self) {
        self.inner.store.lock().clear();
    }

    /// Live keys, checked one at a time as the iterator advances.
    pub fn keys(&self) -> SharedKeys {
        self.keys_matching(KeyFilter::All)
    }

    pub fn keys_matching(&self, filter: KeyFilter) -> SharedKeys {
        SharedKeys::new(Arc::clone(&self.inner.store), filter)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> SharedKeys {
        self.keys_matching(KeyFilter::Prefix(prefix.to_string()))
    }

    pub fn keys_with_suffix(&self, suffix: &str) -> SharedKeys {
        self.keys_matching(KeyFilter::Suffix(suffix.to_string()))
    }

    pub fn keys_containing(&self, text: &str) -> SharedKeys {
        self.keys_matching(KeyFilter::Contains(text.to_string()))
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    /// Copy of the raw entry, without expiry check or access counting.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.store.lock().entry(key).cloned()
    }

    pub fn name(&self) -> String {
        self.inner.store.lock().name().to_string()
    }

    /// Runs one sweep now, outside the schedule.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.store.lock().cleanup_expired()
    }

    /// Runs `f` with exclusive access to the store, for several operations
    /// that must not interleave with others.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut CacheStore) -> R) -> R {
        f(&mut self.inner.store.lock())
    }

    // == Auto Cleanup ==
    /// Starts the periodic sweep, restarting it if already running.
    ///
    /// Does nothing when the configured interval is 0.
    pub fn start_auto_cleanup(&self) -> Result<()> {
        let Some(interval) = self.inner.cleanup_interval else {
            return Ok(());
        };

        let mut sweep = self.inner.sweep.lock();
        if let Some(mut previous) = sweep.take() {
            previous.cancel();
        }
        *sweep = Some(spawn_cleanup_task(
            self.inner.scheduler.as_ref(),
            &self.inner.store,
            interval,
        )?);
        Ok(())
    }

    /// Stops the periodic sweep. Entries are kept; stopping twice is a no-op.
    pub fn stop_auto_cleanup(&self) {
        if let Some(mut sweep) = self.inner.sweep.lock().take() {
            sweep.cancel();
        }
    }

    pub fn is_auto_cleanup_running(&self) -> bool {
        self.inner
            .sweep
            .lock()
            .as_ref()
            .is_some_and(|sweep| sweep.is_active())
    }
}
