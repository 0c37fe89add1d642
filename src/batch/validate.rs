// src/batch/validate.rs

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::batch::model::BatchFile;
use crate::errors::{Result, TaskdagError};
use crate::task::Task;

/// Validate a whole batch against the tasks already stored and build the
/// tasks it would create, without writing anything.
///
/// Entries get increasing creation timestamps in file order, so equal
/// priorities are scheduled in the order they were written.
pub fn plan_batch(batch: &BatchFile, existing: &[Task], now: DateTime<Utc>) -> Result<Vec<Task>> {
    if batch.tasks.is_empty() {
        return Err(TaskdagError::BatchError(
            "batch must contain at least one [[task]] entry".to_string(),
        ));
    }

    let existing_ids: HashSet<&str> = existing.iter().map(|t| t.id.as_str()).collect();

    let mut planned: Vec<Task> = Vec::with_capacity(batch.tasks.len());
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, entry) in batch.tasks.iter().enumerate() {
        let created_at = now + Duration::microseconds(idx as i64);
        let task = entry.to_new_task(&batch.defaults).into_task(created_at)?;

        if !seen.insert(task.id.clone()) || existing_ids.contains(task.id.as_str()) {
            return Err(TaskdagError::DuplicateId(task.id));
        }
        planned.push(task);
    }

    for task in &planned {
        for dep in &task.depends_on {
            if !seen.contains(dep) && !existing_ids.contains(dep.as_str()) {
                return Err(TaskdagError::MissingDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    validate_acyclic(existing, &planned)?;
    Ok(planned)
}

/// Edge direction: dep -> task. A topological sort fails iff there is a
/// cycle.
fn validate_acyclic(existing: &[Task], planned: &[Task]) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in existing.iter().chain(planned) {
        graph.add_node(task.id.as_str());
    }
    for task in existing.iter().chain(planned) {
        for dep in &task.depends_on {
            graph.add_edge(dep.as_str(), task.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskdagError::CircularDependency(vec![
            cycle.node_id().to_string(),
        ])),
    }
}
