// src/task/model.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaskdagError};
use crate::types::{DependencyPolicy, TaskStatus};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 100;
pub const DEFAULT_PRIORITY: u8 = 50;

/// A unit of schedulable work.
///
/// `depends_on` is authoritative. `blocks` is its inverse across the task
/// set and is only ever written by [`crate::dag::DependencyGraph`], which
/// recomputes it from `depends_on`; a stored value is a snapshot, never a
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// 1..=100, higher runs first.
    pub priority: u8,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub blocks: Vec<TaskId>,
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// Handle of the external session the task runs in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<PathBuf>,
    /// Verification commands run after the executor reports success.
    #[serde(default)]
    pub verify: Vec<String>,
}

impl Task {
    /// A fresh `Pending` task with default priority, created now.
    ///
    /// Does not validate the id; use [`crate::task::NewTask`] for user input.
    pub fn new(id: impl Into<TaskId>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            priority: DEFAULT_PRIORITY,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            prompt: String::new(),
            depends_on: Vec::new(),
            blocks: Vec::new(),
            dependency_policy: DependencyPolicy::default(),
            result: None,
            session_id: None,
            worktree: None,
            base_branch: None,
            repository: None,
            verify: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn depends_on_task(&self, id: &str) -> bool {
        self.depends_on.iter().any(|d| d == id)
    }
}

/// Outcome of one execution, recorded on the task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub exit_code: i32,
    pub duration_ms: u64,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Any error, or any non-zero exit code, is a failure.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Identifiers double as file names, so they are restricted to ASCII
/// alphanumerics, `-`, `_` and `.`, and may not start with `.`.
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(TaskdagError::InvalidId(id.to_string()))
    }
}

pub fn validate_priority(task: &str, priority: i64) -> Result<u8> {
    if (i64::from(MIN_PRIORITY)..=i64::from(MAX_PRIORITY)).contains(&priority) {
        Ok(priority as u8)
    } else {
        Err(TaskdagError::InvalidPriority {
            task: task.to_string(),
            priority,
        })
    }
}
