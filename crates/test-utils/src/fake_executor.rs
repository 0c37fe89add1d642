use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskdag::errors::{Result, TaskdagError};
use taskdag::exec::{BoxFuture, ExecutionOutcome, Executor, SessionHandle, SessionProvider};
use taskdag::task::Task;

/// Scripted behaviour for one task id.
#[derive(Debug, Clone)]
pub enum Script {
    Exit(i32),
    Error(String),
    /// Never finishes; only shutdown ends it.
    Hang,
}

/// A fake executor that:
/// - records which tasks were "run", in start order
/// - tracks the highest number of executions in flight at once
/// - finishes each task after `delay` with its scripted outcome
///   (exit code 0 when nothing is scripted).
#[derive(Debug, Default)]
pub struct FakeExecutor {
    scripts: Mutex<HashMap<String, Script>>,
    delay: Duration,
    executed: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, task: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(task.to_string(), script);
        self
    }

    pub fn exit_code(self, task: &str, code: i32) -> Self {
        self.script(task, Script::Exit(code))
    }

    pub fn fail_with(self, task: &str, message: &str) -> Self {
        self.script(task, Script::Error(message.to_string()))
    }

    pub fn hang(self, task: &str) -> Self {
        self.script(task, Script::Hang)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn execute(&self, task: &Task) -> Result<ExecutionOutcome> {
        self.executed.lock().unwrap().push(task.id.clone());
        let _guard = RunningGuard::enter(&self.running, &self.max_running);

        let script = self.scripts.lock().unwrap().get(&task.id).cloned();
        tokio::time::sleep(self.delay).await;

        match script {
            None => Ok(ExecutionOutcome::success()),
            Some(Script::Exit(code)) => Ok(ExecutionOutcome::exit(code)),
            Some(Script::Error(msg)) => Err(TaskdagError::Other(anyhow::anyhow!(msg))),
            Some(Script::Hang) => std::future::pending().await,
        }
    }
}

impl Executor for FakeExecutor {
    fn run<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<ExecutionOutcome>> {
        Box::pin(self.execute(task))
    }
}

struct RunningGuard<'a> {
    running: &'a AtomicUsize,
}

impl<'a> RunningGuard<'a> {
    fn enter(running: &'a AtomicUsize, max_running: &AtomicUsize) -> Self {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        max_running.fetch_max(now, Ordering::SeqCst);
        Self { running }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fake session provider.
///
/// Each session reports `exists == true` for `polls_alive` polls and then
/// disappears. `None` means the session never ends on its own.
#[derive(Debug)]
pub struct FakeSessionProvider {
    polls_alive: Option<usize>,
    sessions: Mutex<HashMap<String, usize>>,
    terminated: Mutex<Vec<String>>,
}

impl FakeSessionProvider {
    pub fn new(polls_alive: Option<usize>) -> Self {
        Self {
            polls_alive,
            sessions: Mutex::new(HashMap::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }
}

impl SessionProvider for FakeSessionProvider {
    fn create<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<SessionHandle>> {
        Box::pin(async move {
            let handle = format!("session-{}", task.id);
            self.sessions.lock().unwrap().insert(handle.clone(), 0);
            Ok(SessionHandle(handle))
        })
    }

    fn exists<'a>(&'a self, handle: &'a SessionHandle) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().unwrap();
            let Some(polls) = sessions.get_mut(&handle.0) else {
                return Ok(false);
            };
            *polls += 1;
            let alive = match self.polls_alive {
                Some(limit) => *polls <= limit,
                None => true,
            };
            if !alive {
                sessions.remove(&handle.0);
            }
            Ok(alive)
        })
    }

    fn terminate<'a>(&'a self, handle: &'a SessionHandle) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.sessions.lock().unwrap().remove(&handle.0);
            self.terminated.lock().unwrap().push(handle.0.clone());
            Ok(())
        })
    }
}
