// src/exec/mod.rs

//! Execution collaborators.
//!
//! - [`backend`] defines the [`Executor`] trait the scheduler dispatches to.
//! - [`command`] runs a shell command per task with `tokio::process`.
//! - [`session`] defines the [`SessionProvider`] seam, polling-based
//!   completion detection, and an executor built on top of sessions.

pub mod backend;
pub mod command;
pub mod session;

pub use backend::{BoxFuture, ExecutionOutcome, Executor};
pub use command::CommandExecutor;
pub use session::{SessionExecutor, SessionHandle, SessionProvider, wait_for_session_end};
