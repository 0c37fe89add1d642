// src/task/mod.rs

//! Task records and everything that operates on a single task.
//!
//! - [`model`] defines the persisted [`Task`] and its [`TaskResult`].
//! - [`lifecycle`] applies status transitions and stamps timestamps.
//! - [`request`] turns a creation request into a validated `Pending` task.
//! - [`query`] implements pattern lookup and list filtering.

pub mod lifecycle;
pub mod model;
pub mod query;
pub mod request;

pub use crate::types::{DependencyPolicy, TaskStatus};
pub use lifecycle::apply_status;
pub use model::{
    DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY, Task, TaskId, TaskResult, validate_id,
    validate_priority,
};
pub use query::{StatusFilter, TaskFilter, find_task_by_pattern};
pub use request::NewTask;
