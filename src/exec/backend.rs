// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The scheduler talks to an [`Executor`] and never to a process directly.
//! Production uses [`super::CommandExecutor`] or [`super::SessionExecutor`];
//! tests provide fakes that return scripted outcomes.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::task::Task;

/// Boxed, sendable future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What one execution produced.
///
/// A non-zero `exit_code` is a failure even when no error was returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub changed_files: Vec<String>,
}

impl ExecutionOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            changed_files: Vec::new(),
        }
    }
}

/// Performs the actual work for one task.
///
/// Invoked once per granted slot, outside every lock. May run for hours.
pub trait Executor: Send + Sync {
    fn run<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<ExecutionOutcome>>;
}
