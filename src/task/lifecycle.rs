// src/task/lifecycle.rs

//! Status transitions on a single task record.

use chrono::{DateTime, Utc};

use crate::errors::{Result, TaskdagError};
use crate::task::Task;
use crate::types::TaskStatus;

/// Move `task` to `next`, stamping timestamps the first time they apply.
///
/// - Entering `Running` sets `started_at` if unset.
/// - Entering a terminal status sets `completed_at` if unset.
/// - Existing timestamps are never overwritten.
///
/// Returns `Ok(false)` when the task is already in `next` (no-op), and
/// `InvalidTransition` for anything that is not an edge of the lifecycle.
pub fn apply_status(task: &mut Task, next: TaskStatus, now: DateTime<Utc>) -> Result<bool> {
    if task.status == next {
        return Ok(false);
    }

    if !task.status.can_transition_to(next) {
        return Err(TaskdagError::InvalidTransition {
            task: task.id.clone(),
            from: task.status,
            to: next,
        });
    }

    task.status = next;

    if next == TaskStatus::Running && task.started_at.is_none() {
        task.started_at = Some(now);
    }
    if next.is_terminal() && task.completed_at.is_none() {
        task.completed_at = Some(now);
    }

    Ok(true)
}
