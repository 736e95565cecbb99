//! Diagnostics Module
//!
//! The logging capability injected into each cache, plus explicit setup of
//! the process-wide tracing subscriber for hosts that want one.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log target used for cache lifecycle events.
pub const LOG_TARGET: &str = "bounded_memcache";

// == Diagnostic Sink ==
/// Receives human-readable cache lifecycle messages.
///
/// Implementations must not panic or block; the cache never depends on
/// what happens to a message.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    fn log(&self, message: &str);
}

// == Tracing Sink ==
/// Forwards messages as `info` events to the active tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: LOG_TARGET, "{}", message);
    }
}

// == Noop Sink ==
/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn log(&self, _message: &str) {}
}

// == Memory Sink ==
/// Keeps messages in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every message logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns true if any logged message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

// == Tracing Setup ==
/// Installs a global tracing subscriber with an env filter and fmt layer.
///
/// `RUST_LOG` overrides `default_filter`. Returns false if a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
