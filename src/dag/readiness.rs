// src/dag/readiness.rs

//! Dependency-completion check and dependency-policy resolution.
//!
//! For a `Pending` task, each prerequisite is inspected:
//!
//! | prerequisite | effect |
//! |---|---|
//! | `Completed` | keep checking |
//! | `Failed` + `Wait` | stays `Pending` |
//! | `Failed` + `Skip` | becomes `Skipped` |
//! | `Failed` + `Fail` | becomes `Failed` |
//! | anything else | stays `Pending` |
//!
//! A failed prerequisite applies the policy even if another prerequisite
//! is still running, so the outcome does not depend on `depends_on` order.
//!
//! Skips and policy failures are expected outcomes, not engine errors.
//! They are logged at `info` with `reason = "dependency policy"`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::{Result, TaskdagError};
use crate::task::{Task, TaskId, apply_status};
use crate::types::{DependencyPolicy, TaskStatus};

use super::graph::{DependencyGraph, scheduling_order};

/// Outcome of checking one `Pending` task against its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyCheck {
    /// Every prerequisite is `Completed`.
    Ready,
    /// At least one prerequisite has not completed; nothing to do yet.
    Waiting,
    /// A prerequisite failed and the task's policy says to skip it.
    Skip { failed_dependency: TaskId },
    /// A prerequisite failed and the task's policy says to fail it.
    Fail { failed_dependency: TaskId },
}

/// A status change made by policy resolution, for the caller to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTransition {
    pub task: TaskId,
    pub to: TaskStatus,
    pub failed_dependency: TaskId,
}

impl DependencyGraph {
    /// Classify a task against its prerequisites without changing anything.
    pub fn check_dependencies(&self, task: &Task) -> DependencyCheck {
        let mut all_completed = true;

        for dep_id in self.deps_of(&task.id) {
            let status = self.get_task(dep_id).map(|d| d.status);
            match status {
                Some(TaskStatus::Completed) => {}
                Some(TaskStatus::Failed) => match task.dependency_policy {
                    DependencyPolicy::Wait => all_completed = false,
                    DependencyPolicy::Skip => {
                        return DependencyCheck::Skip {
                            failed_dependency: dep_id.clone(),
                        };
                    }
                    DependencyPolicy::Fail => {
                        return DependencyCheck::Fail {
                            failed_dependency: dep_id.clone(),
                        };
                    }
                },
                _ => all_completed = false,
            }
        }

        if all_completed {
            DependencyCheck::Ready
        } else {
            DependencyCheck::Waiting
        }
    }

    /// Apply Skip/Fail policies to every affected `Pending` task.
    ///
    /// Repeats until nothing changes, so a task failed by policy in turn
    /// triggers the policies of its own dependents within the same call.
    /// Changes are also queued for [`DependencyGraph::take_policy_transitions`].
    pub fn resolve_dependency_policies(&mut self, now: DateTime<Utc>) -> Vec<PolicyTransition> {
        let mut applied = Vec::new();

        loop {
            let mut changed = false;
            let pending: Vec<TaskId> = self
                .task_ids()
                .into_iter()
                .filter(|id| {
                    self.get_task(id)
                        .is_some_and(|t| t.status == TaskStatus::Pending)
                })
                .cloned()
                .collect();

            for id in pending {
                let Some(task) = self.get_task(&id) else {
                    continue;
                };
                let (to, failed_dependency) = match self.check_dependencies(task) {
                    DependencyCheck::Skip { failed_dependency } => {
                        (TaskStatus::Skipped, failed_dependency)
                    }
                    DependencyCheck::Fail { failed_dependency } => {
                        (TaskStatus::Failed, failed_dependency)
                    }
                    DependencyCheck::Ready | DependencyCheck::Waiting => continue,
                };

                if let Some(task) = self.task_mut(&id) {
                    // Pending -> Skipped/Failed are lifecycle edges; this cannot fail.
                    if apply_status(task, to, now).unwrap_or(false) {
                        info!(
                            task = %id,
                            status = %to,
                            dependency = %failed_dependency,
                            reason = "dependency policy",
                            "prerequisite failed; applying dependency policy"
                        );
                        applied.push(PolicyTransition {
                            task: id.clone(),
                            to,
                            failed_dependency,
                        });
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        self.transitions.extend(applied.iter().cloned());
        applied
    }

    /// Drain policy transitions made since the last call.
    pub fn take_policy_transitions(&mut self) -> Vec<PolicyTransition> {
        std::mem::take(&mut self.transitions)
    }

    /// Every `Pending` task whose prerequisites are all `Completed`.
    ///
    /// Resolves dependency policies first, which may move dependents of
    /// failed tasks to `Skipped`/`Failed`. Order is unspecified.
    pub fn get_ready_tasks(&mut self) -> Vec<&Task> {
        self.resolve_dependency_policies(Utc::now());

        self.tasks()
            .into_iter()
            .filter(|t| {
                t.status == TaskStatus::Pending
                    && self.check_dependencies(t) == DependencyCheck::Ready
            })
            .collect()
    }

    /// Ready tasks sorted by priority (descending), then creation time.
    pub fn ready_in_priority_order(&mut self) -> Vec<Task> {
        let mut ready: Vec<Task> = self.get_ready_tasks().into_iter().cloned().collect();
        ready.sort_by(scheduling_order);
        ready
    }

    /// The single ready task that should run next.
    pub fn get_executable_task(&mut self) -> Result<&Task> {
        let next = self
            .get_ready_tasks()
            .into_iter()
            .min_by(|a, b| scheduling_order(a, b))
            .ok_or(TaskdagError::NoExecutableTasks)?;

        debug!(task = %next.id, priority = next.priority, "selected executable task");
        Ok(next)
    }
}
