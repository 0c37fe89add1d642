// tests/executors.rs

mod common;
use crate::common::{TaskBuilder, init_tracing, seed, temp_store, with_timeout};

use std::error::Error;
use std::sync::Arc;

use tokio::time::Duration;

use taskdag::errors::TaskdagError;
use taskdag::exec::{Executor, SessionExecutor, SessionHandle, SessionProvider, wait_for_session_end};
use taskdag::task::Task;
use taskdag_test_utils::fake_executor::FakeSessionProvider;

type TestResult = Result<(), Box<dyn Error>>;

const POLL: Duration = Duration::from_millis(5);

#[tokio::test]
async fn session_end_is_detected_by_polling() -> TestResult {
    init_tracing();
    let provider = FakeSessionProvider::new(Some(2));
    let handle = provider.create(&TaskBuilder::new("t").build()).await?;

    with_timeout(wait_for_session_end(&provider, &handle, POLL, Duration::from_secs(1))).await?;
    assert!(!provider.exists(&handle).await?);
    assert!(provider.terminated().is_empty());
    Ok(())
}

#[tokio::test]
async fn stuck_session_is_terminated_at_deadline() -> TestResult {
    let provider = FakeSessionProvider::new(None);
    let handle = provider.create(&TaskBuilder::new("stuck").build()).await?;

    let limit = Duration::from_millis(40);
    let result = with_timeout(wait_for_session_end(&provider, &handle, POLL, limit)).await;

    assert!(matches!(result, Err(TaskdagError::Timeout(d)) if d == limit));
    assert_eq!(provider.terminated(), vec!["session-stuck"]);
    Ok(())
}

#[tokio::test]
async fn session_executor_records_the_session_on_the_task() -> TestResult {
    let (_dir, store) = temp_store();
    let task = TaskBuilder::new("agent-task").build();
    seed(&store, [task.clone()]);

    let executor = SessionExecutor::new(FakeSessionProvider::new(Some(1)), POLL, Duration::from_secs(1))
        .with_store(Arc::clone(&store));

    let outcome = with_timeout(executor.run(&task)).await?;
    assert_eq!(outcome.exit_code, 0);

    let found = store.find_task_by_session_id("session-agent-task")?;
    assert_eq!(found.map(|t| t.id), Some("agent-task".to_string()));
    Ok(())
}

#[tokio::test]
async fn session_executor_times_out_without_store() {
    let executor = SessionExecutor::new(FakeSessionProvider::new(None), POLL, Duration::from_millis(20));
    let task = TaskBuilder::new("slow").build();

    let result = with_timeout(executor.run(&task)).await;
    assert!(matches!(result, Err(TaskdagError::Timeout(_))));
    assert_eq!(executor.provider().terminated(), vec!["session-slow"]);
}

#[tokio::test]
async fn session_is_terminated_when_recording_it_fails() -> TestResult {
    let (_dir, store) = temp_store();
    let executor = SessionExecutor::new(FakeSessionProvider::new(None), POLL, Duration::from_secs(1))
        .with_store(Arc::clone(&store));

    // Never saved, so recording the session id fails.
    let ghost = TaskBuilder::new("ghost").build();
    let result = with_timeout(executor.run(&ghost)).await;

    assert!(matches!(result, Err(TaskdagError::NotFound(id)) if id == "ghost"));
    assert_eq!(executor.provider().terminated(), vec!["session-ghost"]);
    let handle = SessionHandle("session-ghost".to_string());
    assert!(!executor.provider().exists(&handle).await?);
    Ok(())
}

#[tokio::test]
async fn aborted_execution_terminates_its_session() -> TestResult {
    init_tracing();
    let executor = Arc::new(SessionExecutor::new(
        FakeSessionProvider::new(None),
        POLL,
        Duration::from_secs(60),
    ));

    let running = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            let task = TaskBuilder::new("abandoned").build();
            executor.run(&task).await
        })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    running.abort();
    assert!(running.await.is_err_and(|e| e.is_cancelled()));

    with_timeout(async {
        while executor.provider().terminated().is_empty() {
            tokio::time::sleep(POLL).await;
        }
    })
    .await;
    assert_eq!(executor.provider().terminated(), vec!["session-abandoned"]);
    Ok(())
}

#[test]
fn session_handle_displays_its_id() {
    assert_eq!(SessionHandle("abc".to_string()).to_string(), "abc");
}

#[cfg(unix)]
mod command {
    use super::*;

    use taskdag::exec::CommandExecutor;

    fn task(id: &str) -> Task {
        TaskBuilder::new(id).prompt("do the thing").build()
    }

    #[tokio::test]
    async fn exit_codes_are_reported() -> TestResult {
        let ok = CommandExecutor::new("true").run(&task("ok")).await?;
        assert_eq!(ok.exit_code, 0);

        let failed = CommandExecutor::new("exit 3").run(&task("failed")).await?;
        assert_eq!(failed.exit_code, 3);
        Ok(())
    }

    #[tokio::test]
    async fn task_details_are_exported_to_the_command() -> TestResult {
        let executor = CommandExecutor::new(
            r#"test "$TASKDAG_TASK_ID" = env-check && test "$TASKDAG_PROMPT" = "do the thing""#,
        );
        let outcome = executor.run(&task("env-check")).await?;
        assert_eq!(outcome.exit_code, 0);
        Ok(())
    }

    #[tokio::test]
    async fn verification_runs_after_success() -> TestResult {
        let mut checked = task("checked");
        checked.verify = vec!["true".to_string(), "exit 4".to_string(), "exit 5".to_string()];

        let outcome = CommandExecutor::new("true").run(&checked).await?;
        assert_eq!(outcome.exit_code, 4);

        let unverified = CommandExecutor::new("true").with_verify(false).run(&checked).await?;
        assert_eq!(unverified.exit_code, 0);
        Ok(())
    }

    #[tokio::test]
    async fn verification_is_skipped_after_failure() -> TestResult {
        let mut checked = task("broken");
        checked.verify = vec!["exit 9".to_string()];

        let outcome = CommandExecutor::new("exit 2").run(&checked).await?;
        assert_eq!(outcome.exit_code, 2);
        Ok(())
    }

    #[tokio::test]
    async fn runs_in_the_worktree_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("marker"), "here")?;
        let worktree = dir.path().to_string_lossy().into_owned();

        let located = TaskBuilder::new("located").worktree(&worktree).build();
        let outcome = CommandExecutor::new("test -f marker").run(&located).await?;
        assert_eq!(outcome.exit_code, 0);
        Ok(())
    }

    #[tokio::test]
    async fn slow_commands_time_out() {
        let limit = Duration::from_millis(50);
        let executor = CommandExecutor::new("sleep 5").with_timeout(Some(limit));

        let result = with_timeout(executor.run(&task("sleepy"))).await;
        assert!(matches!(result, Err(TaskdagError::Timeout(d)) if d == limit));
    }
}
