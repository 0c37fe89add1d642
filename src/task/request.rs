// src/task/request.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::errors::{Result, TaskdagError};
use crate::task::model::{DEFAULT_PRIORITY, Task, TaskId, validate_id, validate_priority};
use crate::types::{DependencyPolicy, TaskStatus};

/// A request to create one task, as produced by the CLI or a batch entry.
///
/// Priority is kept wide (`i64`) so out-of-range input is reported as
/// `InvalidPriority` instead of being truncated.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub id: TaskId,
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub prompt: String,
    pub depends_on: Vec<TaskId>,
    pub dependency_policy: DependencyPolicy,
    pub worktree: Option<String>,
    pub base_branch: Option<String>,
    pub repository: Option<PathBuf>,
    pub verify: Vec<String>,
}

impl NewTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Validate the request in isolation and build a `Pending` task.
    ///
    /// Checks id syntax, priority range, self-dependency and repeated
    /// dependencies. Whether the dependencies exist is a property of the
    /// whole task set and is checked by the graph.
    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task> {
        validate_id(&self.id)?;
        let priority =
            validate_priority(&self.id, self.priority.unwrap_or(i64::from(DEFAULT_PRIORITY)))?;

        let mut depends_on: Vec<TaskId> = Vec::with_capacity(self.depends_on.len());
        for dep in self.depends_on {
            validate_id(&dep)?;
            if dep == self.id {
                return Err(TaskdagError::CircularDependency(vec![
                    self.id.clone(),
                    self.id.clone(),
                ]));
            }
            if !depends_on.contains(&dep) {
                depends_on.push(dep);
            }
        }

        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.id.clone(),
        };

        Ok(Task {
            id: self.id,
            name,
            priority,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            prompt: self.prompt,
            depends_on,
            blocks: Vec::new(),
            dependency_policy: self.dependency_policy,
            result: None,
            session_id: None,
            worktree: self.worktree,
            base_branch: self.base_branch,
            repository: self.repository,
            verify: self.verify,
        })
    }
}
