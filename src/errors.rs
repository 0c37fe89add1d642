// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Variants follow the four failure families the engine distinguishes:
//! - validation (ids, priorities, dependencies, transitions)
//! - resource exhaustion (slots), which callers may retry
//! - persistence (IO / JSON)
//! - batch and configuration input

use thiserror::Error;

use crate::task::TaskStatus;

#[derive(Error, Debug)]
pub enum TaskdagError {
    #[error("Invalid task id: {0:?}")]
    InvalidId(String),

    #[error("Duplicate task id: {0}")]
    DuplicateId(String),

    #[error("Invalid priority {priority} for task '{task}' (expected 1..=100)")]
    InvalidPriority { task: String, priority: i64 },

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency { task: String, dependency: String },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Invalid status transition for task '{task}': {from} -> {to}")]
    InvalidTransition {
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Pattern '{pattern}' matches multiple tasks: {}", .matches.join(", "))]
    AmbiguousPattern {
        pattern: String,
        matches: Vec<String>,
    },

    #[error("No executable tasks")]
    NoExecutableTasks,

    #[error("No slots available for category {0}")]
    NoSlotsAvailable(String),

    #[error("Unknown resource category: {0}")]
    UnknownCategory(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Batch error: {0}")]
    BatchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskdagError {
    /// Resource exhaustion is the only family a caller is expected to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskdagError::NoSlotsAvailable(_) | TaskdagError::Timeout(_)
        )
    }

    /// Validation failures: always surfaced, never auto-corrected.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TaskdagError::InvalidId(_)
                | TaskdagError::DuplicateId(_)
                | TaskdagError::InvalidPriority { .. }
                | TaskdagError::MissingDependency { .. }
                | TaskdagError::CircularDependency(_)
                | TaskdagError::InvalidTransition { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdagError>;
