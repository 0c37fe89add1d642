#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use taskdag::task::{Task, TaskResult, TaskStatus};
use taskdag::types::DependencyPolicy;

/// Fixed reference time so creation-order ties are deterministic.
pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).expect("valid timestamp")
}

/// Builder for `Task` to simplify test setup.
///
/// Tasks are `Pending`, priority 50 and created at [`base_time`] unless
/// told otherwise.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        let mut task = Task::new(id);
        task.created_at = base_time();
        Self { task }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn policy(mut self, policy: DependencyPolicy) -> Self {
        self.task.dependency_policy = policy;
        self
    }

    /// Set the status directly, stamping timestamps the way a real
    /// lifecycle would have.
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        if status != TaskStatus::Pending {
            self.task.started_at = Some(self.task.created_at);
        }
        if status.is_terminal() {
            self.task.completed_at = Some(self.task.created_at);
        }
        self
    }

    /// Created `secs` seconds after [`base_time`].
    pub fn created_offset(mut self, secs: i64) -> Self {
        self.task.created_at = base_time() + Duration::seconds(secs);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.task.completed_at = Some(at);
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.task.prompt = prompt.to_string();
        self
    }

    pub fn worktree(mut self, worktree: &str) -> Self {
        self.task.worktree = Some(worktree.to_string());
        self
    }

    pub fn session(mut self, session_id: &str) -> Self {
        self.task.session_id = Some(session_id.to_string());
        self
    }

    pub fn result(mut self, exit_code: i32) -> Self {
        self.task.result = Some(TaskResult {
            exit_code,
            ..TaskResult::default()
        });
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
