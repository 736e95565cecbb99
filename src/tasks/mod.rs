//! Background Tasks Module
//!
//! Periodic work that runs alongside a cache.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at the configured interval

mod cleanup;
mod scheduler;

pub use cleanup::spawn_cleanup_task;
pub use scheduler::{
    ManualScheduler, ScheduledTask, Scheduler, SweepFn, ThreadScheduler, TokioScheduler,
};
