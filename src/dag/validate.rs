// src/dag/validate.rs

//! Structural validation: missing references, cycles, and chain depth.

use std::collections::HashMap;

use crate::errors::{Result, TaskdagError};
use crate::task::TaskId;

use super::graph::DependencyGraph;

/// DFS node colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current recursion stack.
    Gray,
    /// Fully explored.
    Black,
}

impl DependencyGraph {
    /// Check that every prerequisite exists and that there is no cycle.
    ///
    /// Missing references are reported before cycles. Traversal order is by
    /// id, so the reported error is deterministic.
    pub fn validate_dependencies(&self) -> Result<()> {
        for id in self.task_ids() {
            for dep in self.deps_of(id) {
                if !self.contains(dep) {
                    return Err(TaskdagError::MissingDependency {
                        task: id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            return Err(TaskdagError::CircularDependency(cycle));
        }

        Ok(())
    }

    /// Length of the longest dependency chain, counted in tasks.
    ///
    /// A task without prerequisites has depth 1; an empty graph has depth 0.
    /// An edge that closes a cycle contributes 0 instead of looping.
    pub fn get_dependency_depth(&self) -> usize {
        let mut memo: HashMap<&str, usize> = HashMap::new();
        let mut on_path: Vec<&str> = Vec::new();

        self.task_ids()
            .into_iter()
            .map(|id| self.depth_of(id, &mut memo, &mut on_path))
            .max()
            .unwrap_or(0)
    }

    /// Return the first cycle found, as a closed path (`a -> b -> a`).
    fn find_cycle(&self) -> Option<Vec<TaskId>> {
        let mut colors: HashMap<&str, Color> = self
            .task_ids()
            .into_iter()
            .map(|id| (id.as_str(), Color::White))
            .collect();
        let mut path: Vec<&str> = Vec::new();

        for id in self.task_ids() {
            if colors.get(id.as_str()) == Some(&Color::White) {
                if let Some(cycle) = self.dfs_cycle(id, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        id: &'a str,
        colors: &mut HashMap<&'a str, Color>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<TaskId>> {
        colors.insert(id, Color::Gray);
        path.push(id);

        for dep in self.deps_of(id) {
            match colors.get(dep.as_str()).copied() {
                Some(Color::Gray) => {
                    // Back edge: the cycle is the path suffix starting at `dep`.
                    let start = path.iter().position(|p| *p == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<TaskId> =
                        path[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
                // Black (done) or missing (reported separately).
                Some(Color::Black) | None => {}
            }
        }

        path.pop();
        colors.insert(id, Color::Black);
        None
    }

    fn depth_of<'a>(
        &'a self,
        id: &'a str,
        memo: &mut HashMap<&'a str, usize>,
        on_path: &mut Vec<&'a str>,
    ) -> usize {
        if let Some(depth) = memo.get(id) {
            return *depth;
        }
        if on_path.contains(&id) || !self.contains(id) {
            return 0;
        }

        on_path.push(id);
        let deepest_dep = self
            .deps_of(id)
            .iter()
            .map(|dep| self.depth_of(dep, memo, on_path))
            .max()
            .unwrap_or(0);
        on_path.pop();

        let depth = deepest_dep + 1;
        memo.insert(id, depth);
        depth
    }
}
