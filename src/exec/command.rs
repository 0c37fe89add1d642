// src/exec/command.rs

//! Executor that runs a configured shell command per task.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskdagError};
use crate::exec::backend::{BoxFuture, ExecutionOutcome, Executor};
use crate::task::Task;

/// Runs `command` through the platform shell for every task.
///
/// The task is exposed to the command as `TASKDAG_TASK_ID`,
/// `TASKDAG_TASK_NAME` and `TASKDAG_PROMPT`. The working directory is the
/// task's worktree if it is an existing directory, else its repository.
/// After a zero exit, the task's verification commands run in order and
/// the first non-zero exit becomes the result.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: String,
    timeout: Option<Duration>,
    verify: bool,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
            verify: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    async fn run_task(&self, task: &Task) -> Result<ExecutionOutcome> {
        let workdir = working_dir(task);
        info!(
            task = %task.id,
            cmd = %self.command,
            workdir = ?workdir,
            "starting task process"
        );

        let code = run_shell(&self.command, task, workdir.as_deref(), self.timeout).await?;
        if code != 0 || !self.verify {
            return Ok(ExecutionOutcome::exit(code));
        }

        for check in &task.verify {
            let code = run_shell(check, task, workdir.as_deref(), self.timeout).await?;
            if code != 0 {
                warn!(task = %task.id, cmd = %check, exit_code = code, "verification failed");
                return Ok(ExecutionOutcome::exit(code));
            }
            debug!(task = %task.id, cmd = %check, "verification passed");
        }

        Ok(ExecutionOutcome::success())
    }
}

impl Executor for CommandExecutor {
    fn run<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<ExecutionOutcome>> {
        Box::pin(self.run_task(task))
    }
}

fn working_dir(task: &Task) -> Option<PathBuf> {
    let worktree = task
        .worktree
        .as_deref()
        .map(PathBuf::from)
        .filter(|p| p.is_dir());
    worktree.or_else(|| task.repository.clone().filter(|p| p.is_dir()))
}

/// Run one shell command to completion and return its exit code.
///
/// Output is consumed line by line into debug logs so pipes never fill.
/// On timeout the child is killed and `Timeout` is returned.
async fn run_shell(
    command: &str,
    task: &Task,
    workdir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<i32> {
    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    cmd.env("TASKDAG_TASK_ID", &task.id)
        .env("TASKDAG_TASK_NAME", &task.name)
        .env("TASKDAG_PROMPT", &task.prompt)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.id))?;

    if let Some(stdout) = child.stdout.take() {
        let task_id = task.id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_id, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_id = task.id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_id, "stderr: {}", line);
            }
        });
    }

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(task = %task.id, ?limit, "task process timed out; killing");
                if let Err(e) = child.kill().await {
                    warn!(task = %task.id, error = %e, "failed to kill timed-out process");
                }
                return Err(TaskdagError::Timeout(limit));
            }
        },
        None => child.wait().await,
    }
    .with_context(|| format!("waiting for process of task '{}'", task.id))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task.id,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );
    Ok(code)
}
