// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod queue;
pub mod resource;
pub mod store;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::{AddArgs, CliArgs, Command, ListArgs};
use crate::config::{Config, parse_duration, resolve_config};
use crate::engine::{RunSummary, Scheduler, SchedulerCore, SchedulerOptions};
use crate::exec::CommandExecutor;
use crate::resource::{ResourceManager, SlotManager};
use crate::store::TaskStore;
use crate::task::{NewTask, StatusFilter, Task, TaskFilter, TaskStatus};

/// High-level entry point used by `main.rs`.
///
/// Resolves the config, opens the store and dispatches the subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = resolve_config(args.config.as_deref())?;
    if let Some(dir) = args.store_dir {
        cfg.storage_dir = dir;
    }
    debug!(store = %cfg.storage_dir.display(), "configuration resolved");

    let store = Arc::new(TaskStore::open(&cfg.storage_dir)?);

    match args.command {
        Command::Add(add) => cmd_add(&store, add),
        Command::Batch { file, dry_run } => cmd_batch(&store, &file, dry_run),
        Command::List(list) => cmd_list(&store, list),
        Command::Show { pattern, json } => cmd_show(&store, &pattern, json),
        Command::Order => cmd_order(&store),
        Command::Run {
            once,
            max_concurrent,
        } => {
            if once {
                cfg.exit_when_idle = true;
            }
            if let Some(n) = max_concurrent {
                cfg.max_concurrent = n.max(1);
            }
            cmd_run(store, &cfg).await
        }
        Command::Cancel { pattern } => {
            let task = queue::find_task(&store, &pattern)?;
            let task = queue::cancel_task(&store, &task.id)?;
            println!("cancelled {}", task.id);
            Ok(())
        }
        Command::Remove { pattern } => {
            let task = queue::find_task(&store, &pattern)?;
            let (removed, repaired) = queue::remove_task(&store, &task.id)?;
            println!("removed {}", removed.id);
            for id in repaired {
                println!("  dropped dependency from {id}");
            }
            Ok(())
        }
        Command::Cleanup { older_than } => {
            let retention = match older_than {
                Some(s) => parse_duration(&s).map_err(|e| anyhow!("--older-than: {e}"))?,
                None => cfg.retention,
            };
            let removed = store.cleanup(retention)?;
            println!("removed {removed} task(s)");
            Ok(())
        }
    }
}

fn cmd_add(store: &TaskStore, add: AddArgs) -> Result<()> {
    let request = NewTask {
        name: add.name,
        priority: add.priority,
        prompt: add.prompt,
        depends_on: add.depends_on,
        dependency_policy: add.policy.unwrap_or_default(),
        worktree: add.worktree,
        base_branch: add.base_branch,
        repository: add.repository,
        verify: add.verify,
        ..NewTask::new(add.id)
    };
    let task = queue::create_task(store, request)?;
    println!("created {} (priority {})", task.id, task.priority);
    Ok(())
}

fn cmd_batch(store: &TaskStore, file: &std::path::Path, dry_run: bool) -> Result<()> {
    let parsed = batch::load_batch(file)
        .with_context(|| format!("reading batch file {}", file.display()))?;

    let tasks = if dry_run {
        let planned = batch::plan_batch(&parsed, &store.list_tasks()?, Utc::now())?;
        println!("batch is valid; {} task(s) would be created:", planned.len());
        planned
    } else {
        let created = batch::apply_batch(store, &parsed)?;
        println!("created {} task(s):", created.len());
        created
    };

    for task in &tasks {
        println!("  {}", summary_line(task, None));
    }
    Ok(())
}

fn cmd_list(store: &TaskStore, list: ListArgs) -> Result<()> {
    let status = list
        .status
        .as_deref()
        .map(StatusFilter::from_str)
        .transpose()
        .map_err(|e| anyhow!("--status: {e}"))?;
    let created_after = list
        .since
        .as_deref()
        .map(|s| DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)))
        .transpose()
        .context("--since expects an RFC 3339 timestamp")?;

    let filter = TaskFilter {
        status,
        min_priority: list.min_priority,
        created_after,
    };

    let tasks = queue::list_tasks(store)?;
    let selected = filter.apply(&tasks);

    if list.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    let status_of: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();
    for task in selected {
        println!("{}", summary_line(task, Some(&status_of)));
    }
    Ok(())
}

fn cmd_show(store: &TaskStore, pattern: &str, json: bool) -> Result<()> {
    let task = queue::find_task(store, pattern)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    println!("{}", task.id);
    println!("  name: {}", task.name);
    println!("  status: {}", task.status);
    println!("  priority: {}", task.priority);
    println!("  policy: {}", task.dependency_policy);
    println!("  created: {}", task.created_at.to_rfc3339());
    if let Some(t) = task.started_at {
        println!("  started: {}", t.to_rfc3339());
    }
    if let Some(t) = task.completed_at {
        println!("  completed: {}", t.to_rfc3339());
    }
    if !task.depends_on.is_empty() {
        println!("  depends_on: {}", task.depends_on.join(", "));
    }
    if !task.blocks.is_empty() {
        println!("  blocks: {}", task.blocks.join(", "));
    }
    if let Some(ref worktree) = task.worktree {
        println!("  worktree: {worktree}");
    }
    if let Some(ref session) = task.session_id {
        println!("  session: {session}");
    }
    if let Some(ref result) = task.result {
        println!(
            "  result: exit {} in {} ms",
            result.exit_code, result.duration_ms
        );
        if let Some(ref err) = result.error {
            println!("  error: {err}");
        }
        for file in &result.changed_files {
            println!("  changed: {file}");
        }
    }
    if !task.prompt.is_empty() {
        println!("  prompt: {}", task.prompt);
    }
    Ok(())
}

fn cmd_order(store: &TaskStore) -> Result<()> {
    let graph = queue::load_graph(store)?;
    let order = graph.get_topological_order()?;

    for (idx, task) in order.iter().enumerate() {
        if task.depends_on.is_empty() {
            println!("{:>3}. {} (priority {})", idx + 1, task.id, task.priority);
        } else {
            println!(
                "{:>3}. {} (priority {}) after {}",
                idx + 1,
                task.id,
                task.priority,
                task.depends_on.join(", ")
            );
        }
    }
    println!("dependency depth: {}", graph.get_dependency_depth());
    Ok(())
}

async fn cmd_run(store: Arc<TaskStore>, cfg: &Config) -> Result<()> {
    let Some(command) = cfg.executor_command.clone() else {
        bail!("no executor command configured; set `[executor] command` in the config file");
    };

    let slots = Arc::new(SlotManager::new(ResourceManager::new(cfg.max_concurrent)));
    let core = SchedulerCore::new(store, slots);
    let executor = CommandExecutor::new(command)
        .with_timeout(cfg.task_timeout)
        .with_verify(cfg.verify);
    let scheduler = Scheduler::new(
        core,
        Arc::new(executor),
        SchedulerOptions::from_config(cfg),
    );

    // Ctrl-C → graceful shutdown.
    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received");
            token.cancel();
        });
    }

    let summary = scheduler.run(shutdown).await?;
    print_summary(&summary);

    if !summary.failed.is_empty() {
        bail!("{} task(s) failed", summary.failed.len());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let groups = [
        ("completed", &summary.completed),
        ("failed", &summary.failed),
        ("skipped", &summary.skipped),
        ("cancelled", &summary.cancelled),
        ("recovered as failed", &summary.recovered),
        ("stalled", &summary.stalled),
    ];
    for (label, ids) in groups {
        if !ids.is_empty() {
            println!("{label}: {}", ids.join(", "));
        }
    }
}

/// One listing line. With `status_of`, blocked pending tasks show as `waiting`.
fn summary_line(task: &Task, status_of: Option<&HashMap<&str, TaskStatus>>) -> String {
    let status = match status_of {
        Some(map) if crate::task::query::is_waiting(task, map) => "waiting",
        _ => task.status.as_str(),
    };
    format!(
        "{:<24} {:<9} {:>3}  {}",
        task.id, status, task.priority, task.name
    )
}
