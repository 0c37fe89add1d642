// src/dag/graph.rs

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::errors::{Result, TaskdagError};
use crate::task::{Task, TaskId, validate_id};

use super::readiness::PolicyTransition;

/// In-memory index over a task set.
///
/// - `tasks`: id -> task snapshot
/// - `adjacency`: id -> direct prerequisites (the task's `depends_on`)
///
/// Invariant: both maps always have the same key set.
///
/// `Blocks` (the reverse edges) is never authored here: every mutation
/// recomputes each task's `blocks` from `depends_on` across the whole set,
/// so insertion order cannot leave it partially populated.
///
/// The graph has no internal lock. Mutation is serialised by its owner,
/// normally the scheduler loop.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    tasks: HashMap<TaskId, Task>,
    adjacency: HashMap<TaskId, Vec<TaskId>>,
    /// Policy-driven status changes not yet collected by the caller.
    pub(super) transitions: Vec<PolicyTransition>,
}

/// Result of [`DependencyGraph::remove_task`].
#[derive(Debug, Clone)]
pub struct Removal {
    pub removed: Task,
    /// Tasks whose `depends_on` was repaired, in id order.
    pub repaired: Vec<TaskId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a loaded task set (e.g. the store's listing).
    ///
    /// Fails on invalid or duplicate ids. Dependencies are *not* validated;
    /// call [`DependencyGraph::validate_dependencies`] for that.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut graph = Self::new();
        for task in tasks {
            graph.insert(task)?;
        }
        graph.refresh_blocks();
        Ok(graph)
    }

    /// Index a new task.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        let id = task.id.clone();
        self.insert(task)?;
        self.refresh_blocks();
        debug!(task = %id, "task added to graph");
        Ok(())
    }

    /// Replace an existing task in place.
    pub fn update_task(&mut self, task: Task) -> Result<()> {
        if !self.tasks.contains_key(&task.id) {
            return Err(TaskdagError::NotFound(task.id));
        }
        self.adjacency
            .insert(task.id.clone(), task.depends_on.clone());
        self.tasks.insert(task.id.clone(), task);
        self.refresh_blocks();
        Ok(())
    }

    /// Delete a task and strip it from every remaining `depends_on`.
    ///
    /// The repair is silent: dependents simply lose the edge.
    pub fn remove_task(&mut self, id: &str) -> Result<Removal> {
        let removed = self
            .tasks
            .remove(id)
            .ok_or_else(|| TaskdagError::NotFound(id.to_string()))?;
        self.adjacency.remove(id);

        let mut repaired = Vec::new();
        for (task_id, deps) in self.adjacency.iter_mut() {
            if deps.iter().any(|d| d == id) {
                deps.retain(|d| d != id);
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.depends_on.retain(|d| d != id);
                }
                repaired.push(task_id.clone());
            }
        }
        repaired.sort();

        self.refresh_blocks();
        debug!(task = %id, ?repaired, "task removed from graph");
        Ok(Removal { removed, repaired })
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks, ordered by id.
    pub fn tasks(&self) -> Vec<&Task> {
        let mut all: Vec<&Task> = self.tasks.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Consume the graph, returning its task snapshots ordered by id.
    pub fn into_tasks(self) -> Vec<Task> {
        let mut all: Vec<Task> = self.tasks.into_values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Direct prerequisites of `id`; empty for unknown ids.
    pub fn get_dependencies(&self, id: &str) -> Vec<TaskId> {
        self.adjacency.get(id).cloned().unwrap_or_default()
    }

    /// Tasks naming `id` as a direct prerequisite; empty for unknown ids.
    pub fn get_dependents(&self, id: &str) -> Vec<TaskId> {
        self.tasks
            .get(id)
            .map(|t| t.blocks.clone())
            .unwrap_or_default()
    }

    pub(super) fn task_ids(&self) -> Vec<&TaskId> {
        let mut ids: Vec<&TaskId> = self.tasks.keys().collect();
        ids.sort();
        ids
    }

    pub(super) fn deps_of(&self, id: &str) -> &[TaskId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(super) fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    fn insert(&mut self, task: Task) -> Result<()> {
        validate_id(&task.id)?;
        if self.tasks.contains_key(&task.id) {
            return Err(TaskdagError::DuplicateId(task.id));
        }
        self.adjacency
            .insert(task.id.clone(), task.depends_on.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Recompute every task's `blocks` from the adjacency map.
    fn refresh_blocks(&mut self) {
        let mut reverse: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for (id, deps) in &self.adjacency {
            for dep in deps {
                reverse.entry(dep.as_str()).or_default().insert(id.as_str());
            }
        }

        let blocks: HashMap<TaskId, Vec<TaskId>> = self
            .tasks
            .keys()
            .map(|id| {
                let dependents = reverse
                    .get(id.as_str())
                    .map(|set| set.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default();
                (id.clone(), dependents)
            })
            .collect();

        for (id, dependents) in blocks {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.blocks = dependents;
            }
        }
    }
}

/// Scheduling order between two tasks: higher priority first, then earlier
/// creation (FIFO among equals), then id so the order is total.
pub fn scheduling_order(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}
