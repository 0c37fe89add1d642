// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskdagError};
use crate::exec::{ExecutionOutcome, Executor};
use crate::task::{Task, TaskId, TaskStatus};

use super::core::{SchedulerCore, Tick};
use super::{RunSummary, SchedulerOptions};

type Finished = (TaskId, Result<ExecutionOutcome>, Duration);

/// Drives [`SchedulerCore`] and runs dispatched tasks on an [`Executor`].
///
/// Each dispatched task runs on its own Tokio task inside a `JoinSet`,
/// outside every lock. The loop wakes on a completion, on the poll
/// interval (to pick up tasks added by other processes), or on shutdown.
pub struct Scheduler {
    core: SchedulerCore,
    executor: Arc<dyn Executor>,
    options: SchedulerOptions,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(core: SchedulerCore, executor: Arc<dyn Executor>, options: SchedulerOptions) -> Self {
        Self {
            core,
            executor,
            options,
        }
    }

    pub fn core(&self) -> &SchedulerCore {
        &self.core
    }

    /// Main loop.
    ///
    /// On shutdown, in-flight executions are aborted, their tasks are
    /// marked `Cancelled` and every slot is released before returning.
    /// An execution that already finished is recorded normally.
    pub async fn run(self, shutdown: CancellationToken) -> Result<RunSummary> {
        info!(
            poll_interval = ?self.options.poll_interval,
            exit_when_idle = self.options.exit_when_idle,
            "scheduler started"
        );

        let mut summary = RunSummary {
            recovered: self.core.recover_interrupted()?,
            ..RunSummary::default()
        };

        let mut in_flight: JoinSet<Finished> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, TaskId> = HashMap::new();

        let outcome = self
            .drive(&shutdown, &mut in_flight, &mut running, &mut summary)
            .await;

        if !in_flight.is_empty() {
            info!(count = in_flight.len(), "aborting in-flight tasks");
            in_flight.abort_all();
            // Executions that finished before the abort keep their outcome;
            // only the aborted ones stay in `running` to be cancelled below.
            while let Some(joined) = in_flight.join_next_with_id().await {
                match joined {
                    Err(err) if err.is_cancelled() => {}
                    joined => self.handle_joined(joined, &mut running, &mut summary),
                }
            }
        }
        for (_, id) in running.drain() {
            match self.core.cancel_in_flight(&id) {
                Ok(task) => summary.record(&task),
                Err(e) => warn!(task = %id, error = %e, "failed to mark task cancelled"),
            }
        }
        let swept = self.core.slots().release_all();
        if swept > 0 {
            debug!(swept, "released remaining slots");
        }

        outcome?;
        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            cancelled = summary.cancelled.len(),
            stalled = summary.stalled.len(),
            "scheduler exiting"
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        shutdown: &CancellationToken,
        in_flight: &mut JoinSet<Finished>,
        running: &mut HashMap<tokio::task::Id, TaskId>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        loop {
            if shutdown.is_cancelled() {
                info!("shutdown requested");
                return Ok(());
            }

            let tick = self.core.tick()?;
            record_transitions(&tick, summary);
            for task in tick.dispatched {
                self.spawn(in_flight, running, task);
            }

            if in_flight.is_empty() && self.options.exit_when_idle {
                summary.stalled = self.core.pending()?;
                if !summary.stalled.is_empty() {
                    warn!(
                        stalled = ?summary.stalled,
                        "no task can make progress; pending tasks remain"
                    );
                }
                info!("scheduler idle; exiting");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                Some(joined) = in_flight.join_next_with_id() => {
                    self.handle_joined(joined, running, summary);
                }
                _ = sleep(self.options.poll_interval) => {
                    debug!("poll interval elapsed");
                }
            }
        }
    }

    fn spawn(
        &self,
        in_flight: &mut JoinSet<Finished>,
        running: &mut HashMap<tokio::task::Id, TaskId>,
        task: Task,
    ) {
        let id = task.id.clone();
        let executor = Arc::clone(&self.executor);
        let handle = in_flight.spawn(async move {
            let started = Instant::now();
            let outcome = executor.run(&task).await;
            (task.id, outcome, started.elapsed())
        });
        debug!(task = %id, "execution spawned");
        running.insert(handle.id(), id);
    }

    fn handle_joined(
        &self,
        joined: std::result::Result<(tokio::task::Id, Finished), tokio::task::JoinError>,
        running: &mut HashMap<tokio::task::Id, TaskId>,
        summary: &mut RunSummary,
    ) {
        let (id, outcome, elapsed) = match joined {
            Ok((join_id, (id, outcome, elapsed))) => {
                running.remove(&join_id);
                (id, outcome, elapsed)
            }
            Err(err) => {
                let Some(id) = running.remove(&err.id()) else {
                    warn!(error = %err, "untracked execution ended abnormally");
                    return;
                };
                let outcome = Err(TaskdagError::Other(anyhow::anyhow!(
                    "execution aborted: {err}"
                )));
                (id, outcome, Duration::ZERO)
            }
        };

        match self.core.complete(&id, outcome, elapsed) {
            Ok(task) => summary.record(&task),
            Err(e) => warn!(task = %id, error = %e, "failed to record task outcome"),
        }
    }
}

fn record_transitions(tick: &Tick, summary: &mut RunSummary) {
    for transition in &tick.transitions {
        match transition.to {
            TaskStatus::Skipped => summary.skipped.push(transition.task.clone()),
            TaskStatus::Failed => summary.failed.push(transition.task.clone()),
            _ => {}
        }
    }
}
