// src/dag/order.rs

use std::collections::HashMap;

use crate::errors::{Result, TaskdagError};
use crate::task::Task;

use super::graph::{DependencyGraph, scheduling_order};

impl DependencyGraph {
    /// All tasks, each placed after every one of its dependencies.
    ///
    /// Kahn-style reduction processed level by level: a level is the set of
    /// tasks whose dependencies all appeared in earlier levels. Within a level
    /// tasks are ordered by priority (descending), then creation time, then
    /// id, which makes the result a deterministic total order.
    ///
    /// Fails with the same errors as
    /// [`DependencyGraph::validate_dependencies`].
    pub fn get_topological_order(&self) -> Result<Vec<&Task>> {
        self.validate_dependencies()?;

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for id in self.task_ids() {
            let deps = self.deps_of(id);
            in_degree.insert(id.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }

        let mut level: Vec<&Task> = self
            .tasks()
            .into_iter()
            .filter(|t| in_degree.get(t.id.as_str()) == Some(&0))
            .collect();

        let mut order: Vec<&Task> = Vec::with_capacity(self.len());
        while !level.is_empty() {
            level.sort_by(|a, b| scheduling_order(a, b));

            let mut next_level: Vec<&Task> = Vec::new();
            for task in &level {
                for dependent in dependents.get(task.id.as_str()).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            if let Some(t) = self.get_task(dependent) {
                                next_level.push(t);
                            }
                        }
                    }
                }
            }

            order.append(&mut level);
            level = next_level;
        }

        if order.len() != self.len() {
            // Only reachable if validation and the reduction disagree.
            let stuck: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(TaskdagError::CircularDependency(stuck));
        }

        Ok(order)
    }
}
