// src/dag/mod.rs

//! Dependency graph over a task set.
//!
//! - [`graph`] holds the index (tasks + adjacency) and its mutations.
//! - [`validate`] checks for missing references and cycles, and measures
//!   chain depth.
//! - [`readiness`] decides which `Pending` tasks may run and applies
//!   dependency policies when a prerequisite failed.
//! - [`order`] produces the deterministic topological order.

pub mod graph;
pub mod order;
pub mod readiness;
pub mod validate;

pub use graph::{DependencyGraph, Removal, scheduling_order};
pub use readiness::{DependencyCheck, PolicyTransition};
