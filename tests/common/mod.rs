#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use taskdag::fs::mock::MockFileSystem;
use taskdag::store::TaskStore;
use taskdag::task::Task;

pub use taskdag_test_utils::builders::{TaskBuilder, base_time};
pub use taskdag_test_utils::{init_tracing, with_timeout};

/// Store on a real temporary directory. Keep the `TempDir` alive.
pub fn temp_store() -> (TempDir, Arc<TaskStore>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = TaskStore::open(dir.path().join("tasks")).expect("open store");
    (dir, Arc::new(store))
}

/// Store on an in-memory filesystem.
pub fn mock_store() -> (MockFileSystem, Arc<TaskStore>) {
    let fs = MockFileSystem::new();
    let store = TaskStore::with_fs("/state/tasks", Arc::new(fs.clone())).expect("open store");
    (fs, Arc::new(store))
}

pub fn seed(store: &TaskStore, tasks: impl IntoIterator<Item = Task>) {
    for task in tasks {
        store.save_task(&task).expect("seed task");
    }
}

pub fn ids<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<String> {
    tasks.into_iter().map(|t| t.id.clone()).collect()
}
