// src/task/query.rs

//! Lookup and filtering over a loaded task set.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::errors::{Result, TaskdagError};
use crate::task::Task;
use crate::types::TaskStatus;

/// Resolve a user-supplied pattern to exactly one task.
///
/// An exact id match wins. Otherwise the pattern is matched
/// case-insensitively as a substring of id, name and worktree; zero
/// matches is `NotFound`, more than one is `AmbiguousPattern`.
pub fn find_task_by_pattern<'a>(tasks: &'a [Task], pattern: &str) -> Result<&'a Task> {
    if let Some(task) = tasks.iter().find(|t| t.id == pattern) {
        return Ok(task);
    }

    let needle = pattern.to_lowercase();
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            t.id.to_lowercase().contains(&needle)
                || t.name.to_lowercase().contains(&needle)
                || t.worktree
                    .as_deref()
                    .is_some_and(|w| w.to_lowercase().contains(&needle))
        })
        .collect();

    match matches.as_slice() {
        [] => Err(TaskdagError::NotFound(pattern.to_string())),
        [only] => Ok(only),
        many => {
            let mut ids: Vec<String> = many.iter().map(|t| t.id.clone()).collect();
            ids.sort();
            Err(TaskdagError::AmbiguousPattern {
                pattern: pattern.to_string(),
                matches: ids,
            })
        }
    }
}

/// Status selector for listings.
///
/// `Waiting` is a display alias: a `Pending` task with at least one
/// dependency that is not `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Is(TaskStatus),
    Waiting,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("waiting") {
            return Ok(StatusFilter::Waiting);
        }
        TaskStatus::from_str(s).map(StatusFilter::Is)
    }
}

/// Filter applied to task listings. All set criteria must hold.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<StatusFilter>,
    pub min_priority: Option<u8>,
    pub created_after: Option<DateTime<Utc>>,
}

impl TaskFilter {
    /// Apply the filter and return matches ordered by priority (descending),
    /// then creation time.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let status_of: HashMap<&str, TaskStatus> =
            tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

        let mut out: Vec<&Task> = tasks
            .iter()
            .filter(|t| self.matches(t, &status_of))
            .collect();

        out.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        out
    }

    fn matches(&self, task: &Task, status_of: &HashMap<&str, TaskStatus>) -> bool {
        if let Some(min) = self.min_priority {
            if task.priority < min {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if task.created_at < after {
                return false;
            }
        }
        match self.status {
            None => true,
            Some(StatusFilter::Is(status)) => task.status == status,
            Some(StatusFilter::Waiting) => is_waiting(task, status_of),
        }
    }
}

/// A `Pending` task whose dependencies are not all `Completed`.
pub fn is_waiting(task: &Task, status_of: &HashMap<&str, TaskStatus>) -> bool {
    task.status == TaskStatus::Pending
        && task
            .depends_on
            .iter()
            .any(|dep| status_of.get(dep.as_str()) != Some(&TaskStatus::Completed))
}
