//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::tasks::{ScheduledTask, Scheduler, SweepFn};

/// Schedules a periodic sweep of expired entries on `scheduler`.
///
/// Each run takes the store lock for the duration of one pass, so the sweep
/// never interleaves with other operations on the same store. Only a weak
/// reference is kept: once the store is dropped the runs become no-ops.
///
/// # Arguments
/// * `scheduler` - Timer capability that drives the sweep
/// * `cache` - Shared store to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// The scheduled task, cancel it to stop sweeping.
///
/// # Example
/// ```ignore
/// let store = Arc::new(Mutex::new(CacheStore::new(CacheConfig::new("pages"))?));
/// let mut sweep = spawn_cleanup_task(&ThreadScheduler, &store, Duration::from_secs(1))?;
/// // Later, during shutdown:
/// sweep.cancel();
/// ```
pub fn spawn_cleanup_task(
    scheduler: &dyn Scheduler,
    cache: &Arc<Mutex<CacheStore>>,
    interval: Duration,
) -> Result<Box<dyn ScheduledTask>> {
    let name = cache.lock().name().to_string();
    info!(
        "Starting TTL cleanup for cache [{}] with interval of {} ms",
        name,
        interval.as_millis()
    );

    scheduler.schedule(interval, sweep_callback(Arc::downgrade(cache), name))
}

fn sweep_callback(cache: Weak<Mutex<CacheStore>>, name: String) -> SweepFn {
    Arc::new(move || {
        let Some(cache) = cache.upgrade() else {
            return;
        };

        let removed = cache.lock().cleanup_expired();
        if removed > 0 {
            debug!("TTL cleanup [{}]: removed {} expired entries", name, removed);
        } else {
            debug!("TTL cleanup [{}]: no expired entries found", name);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Capabilities, EntryOptions, ManualClock};
    use crate::config::CacheConfig;
    use crate::diagnostics::NoopSink;
    use crate::tasks::{ManualScheduler, TokioScheduler};

    fn shared_store(clock: ManualClock) -> Arc<Mutex<CacheStore>> {
        let capabilities = Capabilities::default()
            .with_clock(clock)
            .with_sink(NoopSink);
        let store = CacheStore::with_capabilities(CacheConfig::new("sweep"), capabilities).unwrap();
        Arc::new(Mutex::new(store))
    }

    #[test]
    fn test_cleanup_task_removes_expired_entries() {
        let clock = ManualClock::default();
        let cache = shared_store(clock.clone());
        {
            let mut store = cache.lock();
            store
                .set("expire_soon", "value", EntryOptions::new().ttl(Duration::from_secs(1)))
                .unwrap();
            store.set("long_lived", "value", EntryOptions::new()).unwrap();
        }

        let scheduler = ManualScheduler::new();
        let _sweep = spawn_cleanup_task(&scheduler, &cache, Duration::from_secs(1)).unwrap();

        scheduler.fire();
        assert_eq!(cache.lock().len(), 2, "nothing expired yet");

        clock.advance(Duration::from_millis(1_001));
        scheduler.fire();

        let store = cache.lock();
        assert_eq!(store.len(), 1);
        assert!(store.entry("expire_soon").is_none());
        assert!(store.entry("long_lived").is_some());
    }

    #[test]
    fn test_cleanup_task_outlived_by_scheduler() {
        let cache = shared_store(ManualClock::default());
        let scheduler = ManualScheduler::new();
        let _sweep = spawn_cleanup_task(&scheduler, &cache, Duration::from_secs(1)).unwrap();

        drop(cache);
        // Runs against a dropped store are no-ops
        assert_eq!(scheduler.fire(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = shared_store(ManualClock::default());
        let scheduler = TokioScheduler::current().unwrap();

        let mut handle = spawn_cleanup_task(&scheduler, &cache, Duration::from_secs(1)).unwrap();
        assert!(handle.is_active());

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_active(), "Task should be finished after abort");
    }
}
