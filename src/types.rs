use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stored lifecycle status of a task.
///
/// ```text
/// Pending -> Running -> Completed | Failed | Cancelled
/// Pending -> Skipped            (dependency policy = skip)
/// Pending -> Failed             (dependency policy = fail, never ran)
/// ```
///
/// Nothing ever re-enters `Pending`. "Waiting" is not stored: it is how a
/// `Pending` task with unfinished dependencies is displayed and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Skipped,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Skipped
                | TaskStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// Staying in the same status is not a transition and returns `false`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| format!("invalid task status: {s}"))
    }
}

/// How a task reacts when one of its prerequisites ends up `Failed`.
///
/// - `Wait` (default): stay `Pending`; a human decides what happens next.
/// - `Skip`: the task is marked `Skipped` without running.
/// - `Fail`: the task is marked `Failed` without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    #[default]
    Wait,
    Skip,
    Fail,
}

impl fmt::Display for DependencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyPolicy::Wait => "wait",
            DependencyPolicy::Skip => "skip",
            DependencyPolicy::Fail => "fail",
        };
        f.write_str(s)
    }
}

impl FromStr for DependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wait" => Ok(DependencyPolicy::Wait),
            "skip" => Ok(DependencyPolicy::Skip),
            "fail" => Ok(DependencyPolicy::Fail),
            other => Err(format!(
                "invalid dependency policy: {other} (expected \"wait\", \"skip\" or \"fail\")"
            )),
        }
    }
}

/// Execution-slot category.
///
/// Only development work exists today; the resource manager keys its pools
/// by category so more can be added without changing callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    #[default]
    Development,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::Development => f.write_str("development"),
        }
    }
}
