// src/exec/session.rs

//! Session collaborators: an isolated execution context the work runs in.
//!
//! Completion is detected by polling [`SessionProvider::exists`] on a fixed
//! interval. The poll is bounded by a timeout after which the session is
//! terminated, so a task always reaches a terminal status even when the
//! session never reports back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskdagError};
use crate::exec::backend::{BoxFuture, ExecutionOutcome, Executor};
use crate::store::TaskStore;
use crate::task::Task;

/// Opaque handle returned by a [`SessionProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Creates, observes and terminates sessions.
pub trait SessionProvider: Send + Sync {
    fn create<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<SessionHandle>>;
    fn exists<'a>(&'a self, handle: &'a SessionHandle) -> BoxFuture<'a, Result<bool>>;
    fn terminate<'a>(&'a self, handle: &'a SessionHandle) -> BoxFuture<'a, Result<()>>;
}

/// Poll until the session is gone, or terminate it after `timeout`.
pub async fn wait_for_session_end<P>(
    provider: &P,
    handle: &SessionHandle,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    P: SessionProvider + ?Sized,
{
    let deadline = Instant::now() + timeout;

    loop {
        if !provider.exists(handle).await? {
            debug!(session = %handle, "session ended");
            return Ok(());
        }

        if Instant::now() >= deadline {
            warn!(session = %handle, ?timeout, "session still alive at deadline; terminating");
            if let Err(e) = provider.terminate(handle).await {
                warn!(session = %handle, error = %e, "failed to terminate session");
            }
            return Err(TaskdagError::Timeout(timeout));
        }

        sleep(poll_interval.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}

/// Adapts a [`SessionProvider`] into an [`Executor`].
///
/// A session that ends on its own counts as exit code 0. When a store is
/// attached, the session handle is recorded on the task so it can be found
/// again with [`TaskStore::find_task_by_session_id`].
///
/// A session never outlives its execution: it is terminated when recording
/// or polling fails, and when the execution future is dropped (e.g. the
/// scheduler aborts it on shutdown).
pub struct SessionExecutor<P> {
    provider: Arc<P>,
    poll_interval: Duration,
    timeout: Duration,
    store: Option<Arc<TaskStore>>,
}

impl<P: SessionProvider + 'static> SessionExecutor<P> {
    pub fn new(provider: P, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            provider: Arc::new(provider),
            poll_interval,
            timeout,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn run_in_session(&self, task: &Task) -> Result<ExecutionOutcome> {
        let handle = self.provider.create(task).await?;
        info!(task = %task.id, session = %handle, "session created");

        let guard = TerminateOnDrop::new(Arc::clone(&self.provider), handle.clone());
        let watched = self.watch_session(task, &handle).await;
        guard.disarm();

        match watched {
            Ok(()) => Ok(ExecutionOutcome::success()),
            // Already terminated by the poll at its deadline.
            Err(TaskdagError::Timeout(limit)) => Err(TaskdagError::Timeout(limit)),
            Err(err) => {
                warn!(task = %task.id, session = %handle, error = %err, "session failed; terminating");
                if let Err(e) = self.provider.terminate(&handle).await {
                    warn!(session = %handle, error = %e, "failed to terminate session");
                }
                Err(err)
            }
        }
    }

    async fn watch_session(&self, task: &Task, handle: &SessionHandle) -> Result<()> {
        if let Some(store) = &self.store {
            let session_id = handle.0.clone();
            store.update_task(&task.id, |t| {
                t.session_id = Some(session_id);
                Ok(())
            })?;
        }

        wait_for_session_end(self.provider.as_ref(), handle, self.poll_interval, self.timeout).await
    }
}

impl<P: SessionProvider + 'static> Executor for SessionExecutor<P> {
    fn run<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<ExecutionOutcome>> {
        Box::pin(self.run_in_session(task))
    }
}

/// Terminates the session on drop unless disarmed.
///
/// Dropping happens synchronously, so termination is spawned onto the
/// current runtime.
struct TerminateOnDrop<P: SessionProvider + 'static> {
    provider: Arc<P>,
    handle: Option<SessionHandle>,
}

impl<P: SessionProvider + 'static> TerminateOnDrop<P> {
    fn new(provider: Arc<P>, handle: SessionHandle) -> Self {
        Self {
            provider,
            handle: Some(handle),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl<P: SessionProvider + 'static> Drop for TerminateOnDrop<P> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session = %handle, "no runtime to terminate abandoned session");
            return;
        };

        info!(session = %handle, "execution dropped; terminating session");
        let provider = Arc::clone(&self.provider);
        runtime.spawn(async move {
            if let Err(e) = provider.terminate(&handle).await {
                warn!(session = %handle, error = %e, "failed to terminate session");
            }
        });
    }
}

impl<P> fmt::Debug for SessionExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionExecutor")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
