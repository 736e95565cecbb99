//! Integration Tests for the shared cache handle
//!
//! Exercises the public surface end to end with a manual clock and scheduler,
//! plus runs of the default thread and tokio schedulers.

use std::thread::sleep;
use std::time::{Duration, Instant};

use bounded_memcache::cache::{CacheValue, Clock, EntryOptions, ManualClock, SetOutcome};
use bounded_memcache::diagnostics::{MemorySink, NoopSink};
use bounded_memcache::tasks::ManualScheduler;
use bounded_memcache::{CacheConfig, MemCache};
use serde::{Deserialize, Serialize};
use serde_json::json;

// == Helper Functions ==

struct Harness {
    cache: MemCache,
    clock: ManualClock,
    scheduler: ManualScheduler,
    sink: MemorySink,
}

fn harness(config: CacheConfig) -> Harness {
    let clock = ManualClock::default();
    let scheduler = ManualScheduler::new();
    let sink = MemorySink::new();
    let cache = MemCache::builder(config)
        .clock(clock.clone())
        .scheduler(scheduler.clone())
        .sink(sink.clone())
        .build()
        .expect("cache should build");
    Harness {
        cache,
        clock,
        scheduler,
        sink,
    }
}

fn text(value: &str) -> Option<CacheValue> {
    Some(CacheValue::Text(value.to_string()))
}

// == TTL ==

#[test]
fn test_ttl_roundtrip() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("ttl"));

    h.cache
        .set("k", "v", EntryOptions::new().ttl(Duration::from_millis(10)))?;
    assert_eq!(h.cache.get("k")?, text("v"));

    h.clock.advance(Duration::from_millis(11));
    assert_eq!(h.cache.get("k")?, None);
    assert!(!h.cache.has("k"));
    Ok(())
}

#[test]
fn test_absolute_expiry_wins_over_ttl() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("expiry"));
    let at = h.clock.now_ms() + 1_000;

    h.cache.set(
        "k",
        "v",
        EntryOptions::new()
            .ttl(Duration::from_millis(10))
            .expires_at(at),
    )?;

    h.clock.advance(Duration::from_millis(500));
    assert!(h.cache.has("k"));
    h.clock.advance(Duration::from_millis(501));
    assert!(!h.cache.has("k"));
    Ok(())
}

// == Values ==

#[test]
fn test_values_and_metadata() -> anyhow::Result<()> {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        roles: Vec<String>,
    }

    let h = harness(CacheConfig::new("values"));
    let session = Session {
        user: "ada".to_string(),
        roles: vec!["admin".to_string()],
    };

    h.cache.set_json(
        "session:1",
        &session,
        EntryOptions::new().meta(json!({"source": "login"})),
    )?;
    h.cache.set("blob", vec![1u8, 2, 3], EntryOptions::new())?;

    assert_eq!(h.cache.get_json::<Session>("session:1")?, Some(session));
    assert_eq!(h.cache.get("blob")?, Some(CacheValue::Bytes(vec![1, 2, 3])));

    let item = h.cache.peek_with_meta("session:1")?.expect("entry present");
    assert_eq!(item.meta, Some(json!({"source": "login"})));
    assert_eq!(h.cache.entry("session:1").map(|e| e.access_count), Some(1));
    Ok(())
}

#[test]
fn test_overwrite_accounting() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("overwrite"));

    h.cache.set("k", "a", EntryOptions::new())?;
    h.cache.set("k", "bbbbb", EntryOptions::new())?;

    let stats = h.cache.stats();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.size_bytes, 5 * 2 + 100);
    Ok(())
}

// == Capacity ==

#[test]
fn test_oversized_rejection() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("tiny").with_max_size_bytes(1_024));

    let outcome = h.cache.set("big", vec![0u8; 2_048], EntryOptions::new())?;
    assert!(!outcome.is_stored());
    assert!(!h.cache.has("big"));
    Ok(())
}

#[test]
fn test_eviction_ordering() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("ordering").with_max_count(3));

    h.cache.set("a", "1", EntryOptions::new().importance(1))?;
    h.cache.set("b", "2", EntryOptions::new().importance(1))?;
    h.cache.set("c", "3", EntryOptions::new().importance(10))?;
    for _ in 0..5 {
        h.cache.get("a")?;
    }
    h.cache.get("b")?;

    assert_eq!(
        h.cache.set("d", "4", EntryOptions::new().importance(10))?,
        SetOutcome::Stored
    );
    assert!(!h.cache.has("b"));
    assert!(h.cache.has("a"));

    h.cache.set("e", "5", EntryOptions::new().importance(10))?;
    assert!(!h.cache.has("a"));
    assert!(h.cache.has("c"));
    assert_eq!(h.cache.stats().evictions, 2);
    assert!(h.sink.contains("GC eviction started"));
    Ok(())
}

#[test]
fn test_size_limit_respected_under_churn() -> anyhow::Result<()> {
    let h = harness(
        CacheConfig::new("churn")
            .with_max_size_bytes(10_000)
            .with_max_count(50),
    );

    for i in 0..500u32 {
        let importance = (i % 10 + 1) as u8;
        h.cache.set(
            format!("item:{}", i),
            "x".repeat((i % 300) as usize),
            EntryOptions::new().importance(importance),
        )?;
        let stats = h.cache.stats();
        assert!(stats.size_bytes <= 10_000);
        assert!(stats.count <= 50);
    }
    Ok(())
}

// == Enumeration ==

#[test]
fn test_key_enumeration() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("enum"));
    for key in ["user:1", "user:2", "order:1"] {
        h.cache.set(key, "v", EntryOptions::new())?;
    }
    h.cache
        .set("user:9", "v", EntryOptions::new().ttl(Duration::from_millis(1)))?;
    h.clock.advance(Duration::from_millis(2));

    let mut users: Vec<String> = h.cache.keys_with_prefix("u").collect();
    users.sort();
    assert_eq!(users, vec!["user:1", "user:2"]);

    let mut ones: Vec<String> = h.cache.keys_with_suffix(":1").collect();
    ones.sort();
    assert_eq!(ones, vec!["order:1", "user:1"]);

    assert_eq!(h.cache.keys_containing("rder").count(), 1);
    assert_eq!(h.cache.len(), 3, "expired key removed during enumeration");
    Ok(())
}

// == Sweep ==

#[test]
fn test_manual_sweep_lifecycle() -> anyhow::Result<()> {
    let h = harness(CacheConfig::new("lifecycle"));
    h.cache
        .set("short", "v", EntryOptions::new().ttl(Duration::from_millis(5)))?;
    h.cache.set("stay", "v", EntryOptions::new())?;

    h.cache.stop_auto_cleanup();
    h.cache.stop_auto_cleanup();
    h.clock.advance(Duration::from_millis(6));
    assert_eq!(h.scheduler.fire(), 0);
    assert_eq!(h.cache.len(), 2, "stopped sweep removes nothing");

    h.cache.start_auto_cleanup()?;
    assert_eq!(h.scheduler.fire(), 1);
    assert_eq!(h.cache.len(), 1);
    assert!(h.sink.contains("recurrent GC finished"));
    Ok(())
}

#[test]
fn test_thread_sweep_outside_runtime() -> anyhow::Result<()> {
    let clock = ManualClock::default();
    let cache = MemCache::builder(CacheConfig::new("thread").with_cleanup_interval_ms(2))
        .clock(clock.clone())
        .sink(NoopSink)
        .build()?;
    cache.set("k", "v", EntryOptions::new().ttl(Duration::from_millis(10)))?;
    clock.advance(Duration::from_millis(11));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !cache.is_empty() && Instant::now() < deadline {
        sleep(Duration::from_millis(1));
    }
    assert_eq!(cache.len(), 0, "sweep should have removed the entry");

    cache.stop_auto_cleanup();
    assert!(!cache.is_auto_cleanup_running());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tokio_sweep_inside_runtime() -> anyhow::Result<()> {
    let clock = ManualClock::default();
    let cache = MemCache::builder(CacheConfig::new("tokio").with_cleanup_interval_ms(20))
        .clock(clock.clone())
        .sink(NoopSink)
        .build()?;
    cache.set("k", "v", EntryOptions::new().ttl(Duration::from_millis(10)))?;
    cache.set("keep", "v", EntryOptions::new())?;
    clock.advance(Duration::from_millis(11));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.len(), 1);
    assert!(cache.is_auto_cleanup_running());

    cache.stop_auto_cleanup();
    assert!(!cache.is_auto_cleanup_running());
    Ok(())
}
