// src/engine/core.rs

//! Synchronous scheduling core.
//!
//! Each call works on a graph freshly loaded from the store and writes every
//! decision straight back, so store and graph never disagree once a call
//! returns. The async shell ([`super::runtime::Scheduler`]) owns the
//! executor and the in-flight set; this core owns no Tokio state and can be
//! driven step by step in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::dag::PolicyTransition;
use crate::errors::Result;
use crate::exec::ExecutionOutcome;
use crate::queue::load_graph;
use crate::resource::SlotManager;
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskResult, TaskStatus, apply_status};

pub const INTERRUPTED_ERROR: &str = "interrupted: scheduler restarted";
pub const SHUTDOWN_ERROR: &str = "cancelled: scheduler shut down";

/// What one scheduling tick decided.
#[derive(Debug, Clone, Default)]
pub struct Tick {
    /// Tasks moved to `Running` and holding a slot, in dispatch order.
    pub dispatched: Vec<Task>,
    /// Dependency-policy changes persisted during this tick.
    pub transitions: Vec<PolicyTransition>,
    /// Ready tasks left behind because every slot is taken.
    pub waiting_for_slot: usize,
}

#[derive(Debug)]
pub struct SchedulerCore {
    store: Arc<TaskStore>,
    slots: Arc<SlotManager>,
}

impl SchedulerCore {
    pub fn new(store: Arc<TaskStore>, slots: Arc<SlotManager>) -> Self {
        Self { store, slots }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn slots(&self) -> &Arc<SlotManager> {
        &self.slots
    }

    /// One pass of: load graph, validate, resolve dependency policies,
    /// then start ready tasks in priority order while slots last.
    ///
    /// A validation failure aborts the tick; it is never skipped over.
    pub fn tick(&self) -> Result<Tick> {
        let mut graph = load_graph(&self.store)?;
        graph.validate_dependencies()?;

        let ready = graph.ready_in_priority_order();
        let transitions = graph.take_policy_transitions();
        for transition in &transitions {
            self.store
                .update_task_status(&transition.task, transition.to)?;
        }

        let mut tick = Tick {
            transitions,
            ..Tick::default()
        };

        for (idx, task) in ready.iter().enumerate() {
            match self.slots.try_acquire(&task.id) {
                Ok(_) => {}
                Err(err) if err.is_retryable() => {
                    tick.waiting_for_slot = ready.len() - idx;
                    debug!(
                        waiting = tick.waiting_for_slot,
                        "no free slot; remaining ready tasks wait for the next tick"
                    );
                    break;
                }
                Err(err) => return Err(err),
            }

            match self.store.advance_task_status(&task.id, TaskStatus::Running) {
                Ok(running) => {
                    info!(task = %running.id, priority = running.priority, "task dispatched");
                    tick.dispatched.push(running);
                }
                Err(err) => {
                    self.slots.release(&task.id);
                    return Err(err);
                }
            }
        }

        Ok(tick)
    }

    /// Record the outcome of one execution and release its slot.
    ///
    /// An executor error or a non-zero exit code ends in `Failed`. If the
    /// task was already moved to a terminal status (e.g. cancelled while
    /// running), the result is recorded and the status is kept.
    pub fn complete(
        &self,
        id: &str,
        outcome: Result<ExecutionOutcome>,
        elapsed: Duration,
    ) -> Result<Task> {
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let result = match outcome {
            Ok(outcome) => TaskResult {
                exit_code: outcome.exit_code,
                duration_ms,
                changed_files: outcome.changed_files,
                error: None,
            },
            Err(err) => {
                warn!(task = %id, error = %err, "executor returned an error");
                TaskResult {
                    exit_code: -1,
                    duration_ms,
                    changed_files: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        };
        let status = if result.is_success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        let updated = self.store.update_task(id, |task| {
            task.result = Some(result);
            if task.is_terminal() {
                debug!(task = %task.id, status = %task.status, "task already terminal; keeping status");
                return Ok(());
            }
            apply_status(task, status, Utc::now())?;
            Ok(())
        });

        self.slots.release(id);

        let task = updated?;
        info!(
            task = %task.id,
            status = %task.status,
            exit_code = task.result.as_ref().map(|r| r.exit_code),
            "task finished"
        );
        Ok(task)
    }

    /// Mark an in-flight task `Cancelled` and release its slot.
    pub fn cancel_in_flight(&self, id: &str) -> Result<Task> {
        let updated = self.store.update_task(id, |task| {
            if task.is_terminal() {
                return Ok(());
            }
            if task.result.is_none() {
                task.result = Some(TaskResult {
                    exit_code: -1,
                    error: Some(SHUTDOWN_ERROR.to_string()),
                    ..TaskResult::default()
                });
            }
            apply_status(task, TaskStatus::Cancelled, Utc::now())?;
            Ok(())
        });
        self.slots.release(id);
        updated
    }

    /// Crash recovery: a task persisted as `Running` has no live execution
    /// in this process. Mark each one `Failed` and sweep tracked slots.
    pub fn recover_interrupted(&self) -> Result<Vec<TaskId>> {
        let swept = self.slots.release_all();
        if swept > 0 {
            warn!(swept, "released slots left over from a previous run");
        }

        let mut recovered = Vec::new();
        for task in self.store.get_tasks_by_status(TaskStatus::Running)? {
            self.store.update_task(&task.id, |t| {
                t.result = Some(TaskResult {
                    exit_code: -1,
                    error: Some(INTERRUPTED_ERROR.to_string()),
                    ..TaskResult::default()
                });
                apply_status(t, TaskStatus::Failed, Utc::now())?;
                Ok(())
            })?;
            warn!(task = %task.id, "task was running when the previous scheduler stopped; marked failed");
            recovered.push(task.id);
        }
        Ok(recovered)
    }

    /// `Pending` tasks, i.e. what is left when nothing can make progress.
    pub fn pending(&self) -> Result<Vec<TaskId>> {
        Ok(self
            .store
            .get_pending_tasks()?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    /// The task that would run next, without starting it.
    pub fn peek_next(&self) -> Result<Task> {
        let mut graph = load_graph(&self.store)?;
        graph.validate_dependencies()?;
        graph.get_executable_task().cloned()
    }
}
