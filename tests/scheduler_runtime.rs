// tests/scheduler_runtime.rs

mod common;
use crate::common::{TaskBuilder, init_tracing, seed, temp_store, with_timeout};

use std::error::Error;
use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use taskdag::engine::{
    INTERRUPTED_ERROR, SHUTDOWN_ERROR, Scheduler, SchedulerCore, SchedulerOptions,
};
use taskdag::errors::TaskdagError;
use taskdag::exec::{BoxFuture, ExecutionOutcome, Executor};
use taskdag::queue::{cancel_task, create_task};
use taskdag::resource::{ResourceManager, SlotManager};
use taskdag::store::TaskStore;
use taskdag::task::{NewTask, Task, TaskStatus};
use taskdag::types::DependencyPolicy;
use taskdag_test_utils::fake_executor::FakeExecutor;

type TestResult = Result<(), Box<dyn Error>>;

fn new_core(store: &Arc<TaskStore>, max_concurrent: usize) -> (SchedulerCore, Arc<SlotManager>) {
    let slots = Arc::new(SlotManager::new(ResourceManager::new(max_concurrent)));
    (SchedulerCore::new(Arc::clone(store), Arc::clone(&slots)), slots)
}

fn new_scheduler(
    store: &Arc<TaskStore>,
    max_concurrent: usize,
    executor: &Arc<FakeExecutor>,
    exit_when_idle: bool,
) -> (Scheduler, Arc<SlotManager>) {
    let (core, slots) = new_core(store, max_concurrent);
    let executor: Arc<dyn Executor> = executor.clone();
    let options = SchedulerOptions {
        poll_interval: Duration::from_millis(10),
        exit_when_idle,
    };
    (Scheduler::new(core, executor, options), slots)
}

async fn wait_for_status(store: &TaskStore, id: &str, status: TaskStatus) {
    with_timeout(async {
        loop {
            if store.load_task(id).map(|t| t.status).ok() == Some(status) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

#[test]
fn tick_dispatches_by_priority_until_slots_run_out() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("A").priority(25).build(),
            TaskBuilder::new("B").priority(90).build(),
            TaskBuilder::new("C").priority(50).build(),
        ],
    );
    let (core, slots) = new_core(&store, 2);

    let tick = core.tick()?;
    let dispatched: Vec<&str> = tick.dispatched.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(dispatched, vec!["B", "C"]);
    assert_eq!(tick.waiting_for_slot, 1);
    assert!(tick.dispatched.iter().all(|t| t.status == TaskStatus::Running));

    assert_eq!(store.load_task("B")?.status, TaskStatus::Running);
    assert_eq!(store.load_task("A")?.status, TaskStatus::Pending);
    assert!(slots.holds("B") && slots.holds("C"));

    let again = core.tick()?;
    assert!(again.dispatched.is_empty());
    assert_eq!(again.waiting_for_slot, 1);
    Ok(())
}

#[test]
fn complete_records_result_and_releases_slot() -> TestResult {
    let (_dir, store) = temp_store();
    seed(&store, [TaskBuilder::new("ok").build(), TaskBuilder::new("bad").build()]);
    let (core, slots) = new_core(&store, 2);
    core.tick()?;

    let done = core.complete(
        "ok",
        Ok(ExecutionOutcome {
            exit_code: 0,
            changed_files: vec!["src/lib.rs".to_string()],
        }),
        Duration::from_millis(1500),
    )?;
    assert_eq!(done.status, TaskStatus::Completed);
    let result = done.result.expect("result recorded");
    assert_eq!(result.duration_ms, 1500);
    assert_eq!(result.changed_files, vec!["src/lib.rs"]);
    assert!(!slots.holds("ok"));

    let failed = core.complete("bad", Ok(ExecutionOutcome::exit(3)), Duration::ZERO)?;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.result.map(|r| r.exit_code), Some(3));
    assert_eq!(slots.resources().get_stats().active_development, 0);
    Ok(())
}

#[test]
fn externally_cancelled_task_keeps_its_status() -> TestResult {
    let (_dir, store) = temp_store();
    seed(&store, [TaskBuilder::new("t").build()]);
    let (core, slots) = new_core(&store, 1);
    core.tick()?;

    cancel_task(&store, "t")?;
    let task = core.complete("t", Ok(ExecutionOutcome::success()), Duration::ZERO)?;
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.result.is_some());
    assert!(!slots.holds("t"));
    Ok(())
}

#[test]
fn tick_surfaces_validation_failures() {
    let (_dir, store) = temp_store();
    seed(&store, [TaskBuilder::new("orphan").after("missing").build()]);
    let (core, _slots) = new_core(&store, 1);

    assert!(matches!(
        core.tick(),
        Err(TaskdagError::MissingDependency { .. })
    ));
}

#[tokio::test]
async fn chain_runs_in_dependency_order() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("c").priority(100).after("b").build(),
            TaskBuilder::new("b").after("a").build(),
            TaskBuilder::new("a").priority(1).build(),
        ],
    );
    let fake = Arc::new(FakeExecutor::new());
    let (scheduler, _slots) = new_scheduler(&store, 3, &fake, true);

    let summary = with_timeout(scheduler.run(CancellationToken::new())).await?;

    assert_eq!(fake.executed(), vec!["a", "b", "c"]);
    assert_eq!(summary.completed, vec!["a", "b", "c"]);
    assert!(summary.is_clean());
    for id in ["a", "b", "c"] {
        let task = store.load_task(id)?;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.map(|r| r.exit_code), Some(0));
    }
    Ok(())
}

#[tokio::test]
async fn single_slot_runs_highest_priority_first() -> TestResult {
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("A").priority(25).build(),
            TaskBuilder::new("B").priority(90).build(),
            TaskBuilder::new("C").priority(50).build(),
        ],
    );
    let fake = Arc::new(FakeExecutor::new());
    let (scheduler, _slots) = new_scheduler(&store, 1, &fake, true);

    with_timeout(scheduler.run(CancellationToken::new())).await?;
    assert_eq!(fake.executed(), vec!["B", "C", "A"]);
    assert_eq!(fake.max_concurrent(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrency_never_exceeds_the_cap() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        (0..6).map(|i| TaskBuilder::new(&format!("job-{i}")).created_offset(i).build()),
    );
    let fake = Arc::new(FakeExecutor::new().with_delay(Duration::from_millis(30)));
    let (scheduler, slots) = new_scheduler(&store, 2, &fake, true);

    let summary = with_timeout(scheduler.run(CancellationToken::new())).await?;
    assert_eq!(summary.completed.len(), 6);
    assert_eq!(fake.max_concurrent(), 2);
    assert_eq!(slots.resources().get_stats().active_development, 0);
    Ok(())
}

#[tokio::test]
async fn failure_applies_each_dependency_policy() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("a").build(),
            TaskBuilder::new("skip-me").after("a").policy(DependencyPolicy::Skip).build(),
            TaskBuilder::new("wait-me").after("a").policy(DependencyPolicy::Wait).build(),
            TaskBuilder::new("fail-me").after("a").policy(DependencyPolicy::Fail).build(),
        ],
    );
    let fake = Arc::new(FakeExecutor::new().exit_code("a", 1));
    let (scheduler, _slots) = new_scheduler(&store, 2, &fake, true);

    let summary = with_timeout(scheduler.run(CancellationToken::new())).await?;

    assert_eq!(fake.executed(), vec!["a"]);
    assert_eq!(summary.failed, vec!["a", "fail-me"]);
    assert_eq!(summary.skipped, vec!["skip-me"]);
    assert_eq!(summary.stalled, vec!["wait-me"]);
    assert!(!summary.is_clean());

    assert_eq!(store.load_task("a")?.result.map(|r| r.exit_code), Some(1));
    assert_eq!(store.load_task("skip-me")?.status, TaskStatus::Skipped);
    assert_eq!(store.load_task("wait-me")?.status, TaskStatus::Pending);
    let fail_me = store.load_task("fail-me")?;
    assert_eq!(fail_me.status, TaskStatus::Failed);
    assert!(fail_me.result.is_none());
    Ok(())
}

#[tokio::test]
async fn executor_error_is_recorded_as_failure() -> TestResult {
    let (_dir, store) = temp_store();
    seed(&store, [TaskBuilder::new("boom").build()]);
    let fake = Arc::new(FakeExecutor::new().fail_with("boom", "agent crashed"));
    let (scheduler, _slots) = new_scheduler(&store, 1, &fake, true);

    let summary = with_timeout(scheduler.run(CancellationToken::new())).await?;
    assert_eq!(summary.failed, vec!["boom"]);

    let result = store.load_task("boom")?.result.expect("result recorded");
    assert_eq!(result.exit_code, -1);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("agent crashed")));
    Ok(())
}

#[tokio::test]
async fn running_tasks_from_a_previous_run_are_recovered() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("stale").status(TaskStatus::Running).build(),
            TaskBuilder::new("after-stale").after("stale").policy(DependencyPolicy::Skip).build(),
        ],
    );
    let fake = Arc::new(FakeExecutor::new());
    let (scheduler, _slots) = new_scheduler(&store, 1, &fake, true);

    let summary = with_timeout(scheduler.run(CancellationToken::new())).await?;

    assert_eq!(summary.recovered, vec!["stale"]);
    assert_eq!(summary.skipped, vec!["after-stale"]);
    assert!(fake.executed().is_empty());

    let stale = store.load_task("stale")?;
    assert_eq!(stale.status, TaskStatus::Failed);
    assert_eq!(
        stale.result.and_then(|r| r.error).as_deref(),
        Some(INTERRUPTED_ERROR)
    );
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_in_flight_tasks_and_frees_slots() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(&store, [TaskBuilder::new("forever").build()]);
    let fake = Arc::new(FakeExecutor::new().hang("forever"));
    let (scheduler, slots) = new_scheduler(&store, 1, &fake, false);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    wait_for_status(&store, "forever", TaskStatus::Running).await;
    shutdown.cancel();

    let summary = with_timeout(handle).await??;
    assert_eq!(summary.cancelled, vec!["forever"]);

    let task = store.load_task("forever")?;
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(
        task.result.and_then(|r| r.error).as_deref(),
        Some(SHUTDOWN_ERROR)
    );
    assert_eq!(slots.resources().get_stats().active_development, 0);
    assert!(slots.active_slots().is_empty());
    Ok(())
}

/// Requests shutdown from inside the execution, then finishes successfully,
/// so the completion and the shutdown signal arrive together.
struct StopsSchedulerThenSucceeds {
    shutdown: CancellationToken,
}

impl Executor for StopsSchedulerThenSucceeds {
    fn run<'a>(&'a self, _task: &'a Task) -> BoxFuture<'a, taskdag::errors::Result<ExecutionOutcome>> {
        Box::pin(async move {
            self.shutdown.cancel();
            Ok(ExecutionOutcome {
                exit_code: 0,
                changed_files: vec!["src/lib.rs".to_string()],
            })
        })
    }
}

#[tokio::test]
async fn execution_finished_at_shutdown_keeps_its_outcome() -> TestResult {
    init_tracing();
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("a").build(),
            TaskBuilder::new("after-a").after("a").build(),
        ],
    );

    let shutdown = CancellationToken::new();
    let executor: Arc<dyn Executor> = Arc::new(StopsSchedulerThenSucceeds {
        shutdown: shutdown.clone(),
    });
    let (core, slots) = new_core(&store, 1);
    let options = SchedulerOptions {
        poll_interval: Duration::from_secs(60),
        exit_when_idle: false,
    };
    let scheduler = Scheduler::new(core, executor, options);

    let summary = with_timeout(scheduler.run(shutdown)).await?;
    assert_eq!(summary.completed, vec!["a"]);
    assert!(summary.cancelled.is_empty());

    let task = store.load_task("a")?;
    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.expect("result recorded");
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.changed_files, vec!["src/lib.rs"]);
    assert!(result.error.is_none());

    assert_eq!(store.load_task("after-a")?.status, TaskStatus::Pending);
    assert!(slots.active_slots().is_empty());
    Ok(())
}

#[tokio::test]
async fn tasks_added_while_running_are_picked_up() -> TestResult {
    let (_dir, store) = temp_store();
    let fake = Arc::new(FakeExecutor::new());
    let (scheduler, _slots) = new_scheduler(&store, 1, &fake, false);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    create_task(&store, NewTask::new("late-arrival"))?;
    wait_for_status(&store, "late-arrival", TaskStatus::Completed).await;

    shutdown.cancel();
    let summary = with_timeout(handle).await??;
    assert_eq!(summary.completed, vec!["late-arrival"]);
    Ok(())
}

#[tokio::test]
async fn invalid_task_set_stops_the_run() {
    let (_dir, store) = temp_store();
    seed(
        &store,
        [
            TaskBuilder::new("x").after("y").build(),
            TaskBuilder::new("y").after("x").build(),
        ],
    );
    let fake = Arc::new(FakeExecutor::new());
    let (scheduler, _slots) = new_scheduler(&store, 1, &fake, true);

    let result = with_timeout(scheduler.run(CancellationToken::new())).await;
    assert!(matches!(result, Err(TaskdagError::CircularDependency(_))));
    assert!(fake.executed().is_empty());
}
