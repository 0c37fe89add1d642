// src/engine/mod.rs

//! Scheduling engine.
//!
//! Every loop iteration reloads the task set from the store, validates it,
//! applies dependency policies, and starts ready tasks in priority order as
//! long as slots are free. Completions are written back to the store and
//! release their slot.
//!
//! The synchronous decisions live in [`core`]; the async shell that owns the
//! executor and in-flight set is [`runtime`].

use std::time::Duration;

use crate::config::Config;
use crate::task::{Task, TaskId, TaskStatus};

pub mod core;
pub mod runtime;

pub use self::core::{INTERRUPTED_ERROR, SHUTDOWN_ERROR, SchedulerCore, Tick};
pub use runtime::Scheduler;

/// Loop options shared by the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// How often the store is re-read while tasks are running or nothing is ready.
    pub poll_interval: Duration,
    /// Return once nothing is running and nothing can be started (`--once`).
    pub exit_when_idle: bool,
}

impl SchedulerOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            exit_when_idle: cfg.exit_when_idle,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            exit_when_idle: false,
        }
    }
}

/// What happened during one [`Scheduler::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub skipped: Vec<TaskId>,
    pub cancelled: Vec<TaskId>,
    /// Tasks found `Running` at startup and marked failed.
    pub recovered: Vec<TaskId>,
    /// Tasks still `Pending` when an idle run gave up.
    pub stalled: Vec<TaskId>,
}

impl RunSummary {
    pub fn record(&mut self, task: &Task) {
        let bucket = match task.status {
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Skipped => &mut self.skipped,
            TaskStatus::Cancelled => &mut self.cancelled,
            TaskStatus::Pending | TaskStatus::Running => return,
        };
        bucket.push(task.id.clone());
    }

    /// True when every task this run touched ended `Completed`.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
            && self.skipped.is_empty()
            && self.cancelled.is_empty()
            && self.stalled.is_empty()
    }
}
