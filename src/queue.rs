// src/queue.rs

//! Task-queue operations that span the store and the dependency graph.
//!
//! The store is the durable owner; every function here loads a fresh graph
//! from it, validates the change against the whole task set, and only then
//! writes.

use chrono::Utc;
use tracing::info;

use crate::dag::DependencyGraph;
use crate::errors::{Result, TaskdagError};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskStatus, find_task_by_pattern};

/// Build a graph from the store's current listing.
pub fn load_graph(store: &TaskStore) -> Result<DependencyGraph> {
    DependencyGraph::from_tasks(store.list_tasks()?)
}

/// Validate and persist a new `Pending` task.
///
/// Rejects duplicate ids, unknown dependencies and anything that would
/// close a cycle; nothing is written in those cases.
pub fn create_task(store: &TaskStore, request: NewTask) -> Result<Task> {
    let task = request.into_task(Utc::now())?;
    if store.exists(&task.id)? {
        return Err(TaskdagError::DuplicateId(task.id));
    }

    let mut graph = load_graph(store)?;
    graph.add_task(task.clone())?;
    graph.validate_dependencies()?;

    store.save_task(&task)?;
    info!(
        task = %task.id,
        priority = task.priority,
        depends_on = ?task.depends_on,
        policy = %task.dependency_policy,
        "task created"
    );
    Ok(task)
}

/// Every stored task with `blocks` recomputed from the whole set, in
/// creation order.
pub fn list_tasks(store: &TaskStore) -> Result<Vec<Task>> {
    let mut tasks = load_graph(store)?.into_tasks();
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(tasks)
}

/// Resolve `pattern` against the stored tasks.
pub fn find_task(store: &TaskStore, pattern: &str) -> Result<Task> {
    let tasks = list_tasks(store)?;
    find_task_by_pattern(&tasks, pattern).cloned()
}

/// Delete a task and drop it from the `depends_on` of every dependent.
///
/// Returns the removed task and the ids of repaired dependents.
pub fn remove_task(store: &TaskStore, id: &str) -> Result<(Task, Vec<String>)> {
    let mut graph = load_graph(store)?;
    let removal = graph.remove_task(id)?;

    for dependent in &removal.repaired {
        store.update_task(dependent, |task| {
            task.depends_on.retain(|d| d != id);
            Ok(())
        })?;
    }
    store.delete_task(id)?;

    info!(task = %id, repaired = ?removal.repaired, "task removed");
    Ok((removal.removed, removal.repaired))
}

/// Record an external cancellation of a running task.
///
/// Advisory: stopping the underlying process is the executor's job.
/// A task that is already `Cancelled` is an `InvalidTransition`.
pub fn cancel_task(store: &TaskStore, id: &str) -> Result<Task> {
    let task = store.advance_task_status(id, TaskStatus::Cancelled)?;
    info!(task = %id, "task marked cancelled");
    Ok(task)
}
