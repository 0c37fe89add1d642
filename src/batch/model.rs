// src/batch/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::task::{NewTask, TaskId};
use crate::types::DependencyPolicy;

/// The only batch format version this build understands.
pub const SUPPORTED_BATCH_VERSION: i64 = 1;

/// A declarative list of tasks to create together.
///
/// ```toml
/// version = 1
///
/// [defaults]
/// repository = "/src/app"
/// base_branch = "main"
/// priority = 50
///
/// [[task]]
/// id = "schema"
/// worktree = "feat-schema"
/// prompt = "Add the orders table"
/// verify = ["cargo test"]
///
/// [[task]]
/// id = "api"
/// depends_on = ["schema"]
/// dependency_policy = "skip"
/// priority = 80
/// prompt = "Expose orders over HTTP"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    pub version: i64,

    #[serde(default)]
    pub defaults: BatchDefaults,

    /// Entries in file order, from `[[task]]` tables.
    #[serde(default, rename = "task")]
    pub tasks: Vec<BatchEntry>,
}

/// `[defaults]`: values used by entries that leave them unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchDefaults {
    #[serde(default)]
    pub repository: Option<PathBuf>,
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub dependency_policy: Option<DependencyPolicy>,
    #[serde(default)]
    pub verify: Vec<String>,
}

/// One `[[task]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchEntry {
    pub id: TaskId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub worktree: Option<String>,
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub repository: Option<PathBuf>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub dependency_policy: Option<DependencyPolicy>,
    #[serde(default)]
    pub prompt: String,
    /// Overrides `defaults.verify` when present.
    #[serde(default)]
    pub verify: Option<Vec<String>>,
}

impl BatchEntry {
    /// Merge this entry with the batch defaults into a creation request.
    pub fn to_new_task(&self, defaults: &BatchDefaults) -> NewTask {
        NewTask {
            id: self.id.clone(),
            name: self.name.clone(),
            priority: self.priority.or(defaults.priority),
            prompt: self.prompt.clone(),
            depends_on: self.depends_on.clone(),
            dependency_policy: self
                .dependency_policy
                .or(defaults.dependency_policy)
                .unwrap_or_default(),
            worktree: self.worktree.clone(),
            base_branch: self.base_branch.clone().or_else(|| defaults.base_branch.clone()),
            repository: self.repository.clone().or_else(|| defaults.repository.clone()),
            verify: self
                .verify
                .clone()
                .unwrap_or_else(|| defaults.verify.clone()),
        }
    }
}
