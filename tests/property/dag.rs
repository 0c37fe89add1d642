// tests/property/dag.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use proptest::prelude::*;

use taskdag::dag::{DependencyCheck, DependencyGraph};
use taskdag::errors::TaskdagError;
use taskdag::task::{Task, TaskStatus};
use taskdag::types::DependencyPolicy;
use taskdag_test_utils::builders::TaskBuilder;

fn name(i: usize) -> String {
    format!("task-{i}")
}

fn policy_strategy() -> impl Strategy<Value = DependencyPolicy> {
    prop_oneof![
        Just(DependencyPolicy::Wait),
        Just(DependencyPolicy::Skip),
        Just(DependencyPolicy::Fail),
    ]
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        );
        let priorities = proptest::collection::vec(1u8..=100, num_tasks);
        let policies = proptest::collection::vec(policy_strategy(), num_tasks);

        (deps, priorities, policies).prop_map(|(raw_deps, priorities, policies)| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let valid: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    let mut builder = TaskBuilder::new(&name(i))
                        .priority(priorities[i])
                        .policy(policies[i])
                        .created_offset(i as i64);
                    for dep in valid {
                        builder = builder.after(&name(dep));
                    }
                    builder.build()
                })
                .collect()
        })
    })
}

fn assert_blocks_consistent(graph: &DependencyGraph) -> Result<(), TestCaseError> {
    let mut expected: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for task in graph.tasks() {
        for dep in &task.depends_on {
            expected.entry(dep.as_str()).or_default().insert(task.id.as_str());
        }
    }
    for task in graph.tasks() {
        let want: Vec<&str> = expected
            .get(task.id.as_str())
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let got: Vec<&str> = task.blocks.iter().map(String::as_str).collect();
        prop_assert_eq!(got, want, "blocks of {}", task.id);
    }
    Ok(())
}

proptest! {
    #[test]
    fn acyclic_sets_validate_and_order_respects_dependencies(tasks in dag_strategy(12)) {
        let count = tasks.len();
        let graph = DependencyGraph::from_tasks(tasks)?;
        graph.validate_dependencies()?;

        let order = graph.get_topological_order()?;
        prop_assert_eq!(order.len(), count);

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        for task in &order {
            for dep in &task.depends_on {
                prop_assert!(position[dep.as_str()] < position[task.id.as_str()]);
            }
        }

        let depth = graph.get_dependency_depth();
        prop_assert!(depth >= 1 && depth <= count);
        assert_blocks_consistent(&graph)?;
    }

    #[test]
    fn removal_keeps_the_graph_valid(tasks in dag_strategy(12), pick in any::<usize>()) {
        let victim = name(pick % tasks.len());
        let mut graph = DependencyGraph::from_tasks(tasks)?;

        let removal = graph.remove_task(&victim)?;
        prop_assert_eq!(&removal.removed.id, &victim);
        prop_assert!(!graph.contains(&victim));

        graph.validate_dependencies()?;
        for task in graph.tasks() {
            prop_assert!(!task.depends_on_task(&victim));
        }
        for id in &removal.repaired {
            prop_assert!(graph.contains(id));
        }
        assert_blocks_consistent(&graph)?;
    }

    #[test]
    fn a_back_edge_is_reported_as_a_closed_cycle(tasks in dag_strategy(12), pick in any::<usize>()) {
        let edges: Vec<(String, String)> = tasks
            .iter()
            .flat_map(|t| t.depends_on.iter().map(move |d| (t.id.clone(), d.clone())))
            .collect();
        prop_assume!(!edges.is_empty());

        let (dependent, dependency) = edges[pick % edges.len()].clone();
        let mut graph = DependencyGraph::from_tasks(tasks)?;

        let mut reversed = graph
            .get_task(&dependency)
            .cloned()
            .ok_or_else(|| TestCaseError::fail("dependency missing"))?;
        reversed.depends_on.push(dependent.clone());
        graph.update_task(reversed)?;

        match graph.validate_dependencies() {
            Err(TaskdagError::CircularDependency(cycle)) => {
                prop_assert!(cycle.len() >= 3);
                prop_assert_eq!(cycle.first(), cycle.last());
                prop_assert!(cycle.contains(&dependent));
                prop_assert!(cycle.contains(&dependency));
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
        prop_assert!(graph.get_topological_order().is_err());
    }

    #[test]
    fn simulated_runs_settle_and_never_dispatch_early(
        tasks in dag_strategy(10),
        failing in proptest::collection::hash_set(0..10usize, 0..4),
    ) {
        let count = tasks.len();
        let failing: HashSet<String> = failing.into_iter().map(name).collect();
        let mut graph = DependencyGraph::from_tasks(tasks)?;
        let mut dispatched: Vec<String> = Vec::new();

        for _ in 0..=count {
            let ready = graph.ready_in_priority_order();
            if ready.is_empty() {
                break;
            }
            for mut task in ready {
                for dep in &task.depends_on {
                    let status = graph.get_task(dep).map(|d| d.status);
                    prop_assert_eq!(status, Some(TaskStatus::Completed));
                }
                task.status = if failing.contains(&task.id) {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Completed
                };
                dispatched.push(task.id.clone());
                graph.update_task(task)?;
            }
        }

        prop_assert!(graph.ready_in_priority_order().is_empty());
        for task in graph.tasks() {
            prop_assert!(task.status != TaskStatus::Running);
            if task.status == TaskStatus::Pending {
                prop_assert_eq!(graph.check_dependencies(task), DependencyCheck::Waiting);
            }
            if task.status == TaskStatus::Skipped {
                prop_assert!(!dispatched.contains(&task.id));
            }
        }

        if failing.iter().all(|id| !graph.contains(id)) {
            prop_assert_eq!(dispatched.len(), count);
        }
    }
}
