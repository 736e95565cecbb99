//! Scheduler Module
//!
//! The periodic-timer capability used by the background sweep, with tokio,
//! OS-thread and manually driven implementations.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Callback run on every tick.
pub type SweepFn = Arc<dyn Fn() + Send + Sync>;

// == Scheduler Trait ==
/// Runs a callback every `interval` until the returned task is cancelled.
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn schedule(&self, interval: Duration, task: SweepFn) -> Result<Box<dyn ScheduledTask>>;
}

/// Handle to a scheduled callback.
pub trait ScheduledTask: Send + fmt::Debug {
    /// Stops future runs. Cancelling twice is a no-op.
    fn cancel(&mut self);

    fn is_active(&self) -> bool;
}

// == Tokio Scheduler ==
/// Spawns the periodic loop on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| CacheError::Scheduler(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, interval: Duration, task: SweepFn) -> Result<Box<dyn ScheduledTask>> {
        let join = self.handle.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                // The sweep takes a blocking lock, keep it off the runtime workers
                let tick = Arc::clone(&task);
                if let Err(e) = tokio::task::spawn_blocking(move || tick()).await {
                    warn!("Sweep tick failed: {}", e);
                }
            }
        });
        debug!("Spawned tokio sweep task every {:?}", interval);

        Ok(Box::new(TokioTask { join: Some(join) }))
    }
}

#[derive(Debug)]
struct TokioTask {
    join: Option<JoinHandle<()>>,
}

impl ScheduledTask for TokioTask {
    fn cancel(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
            debug!("Aborted tokio sweep task");
        }
    }

    fn is_active(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }
}

impl Drop for TokioTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

// == Thread Scheduler ==
/// Runs the periodic loop on a dedicated OS thread. Works without an async runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, interval: Duration, task: SweepFn) -> Result<Box<dyn ScheduledTask>> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("memcache-sweep".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => task(),
                    // Stop requested or handle dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| CacheError::Scheduler(e.to_string()))?;
        debug!("Spawned sweep thread every {:?}", interval);

        Ok(Box::new(ThreadTask {
            stop: Some(stop_tx),
            thread,
        }))
    }
}

#[derive(Debug)]
struct ThreadTask {
    stop: Option<Sender<()>>,
    thread: thread::JoinHandle<()>,
}

impl ScheduledTask for ThreadTask {
    fn cancel(&mut self) {
        // The thread exits on its own once the channel closes
        if self.stop.take().is_some() {
            debug!("Stopped sweep thread");
        }
    }

    fn is_active(&self) -> bool {
        self.stop.is_some() && !self.thread.is_finished()
    }
}

// == Manual Scheduler ==
/// Runs callbacks only when [`ManualScheduler::fire`] is called.
///
/// Clones share the registered tasks.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    slots: Arc<Mutex<Vec<ManualSlot>>>,
}

struct ManualSlot {
    interval: Duration,
    task: SweepFn,
    active: Arc<AtomicBool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every active callback once. Returns how many ran.
    pub fn fire(&self) -> usize {
        let tasks: Vec<SweepFn> = {
            let mut slots = self.slots.lock();
            slots.retain(|slot| slot.active.load(Ordering::SeqCst));
            slots.iter().map(|slot| Arc::clone(&slot.task)).collect()
        };

        for task in &tasks {
            task();
        }
        tasks.len()
    }

    pub fn active_tasks(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.active.load(Ordering::SeqCst))
            .count()
    }

    /// Intervals of the active callbacks.
    pub fn intervals(&self) -> Vec<Duration> {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.active.load(Ordering::SeqCst))
            .map(|slot| slot.interval)
            .collect()
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, interval: Duration, task: SweepFn) -> Result<Box<dyn ScheduledTask>> {
        let active = Arc::new(AtomicBool::new(true));
        self.slots.lock().push(ManualSlot {
            interval,
            task,
            active: Arc::clone(&active),
        });
        Ok(Box::new(ManualTask { active }))
    }
}

#[derive(Debug)]
struct ManualTask {
    active: Arc<AtomicBool>,
}

impl ScheduledTask for ManualTask {
    fn cancel(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
