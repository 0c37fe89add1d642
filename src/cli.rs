// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::DependencyPolicy;

/// Command-line arguments for `taskdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdag",
    version,
    about = "Queue prioritized tasks with dependencies and run them under a concurrency cap.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `taskdag.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Override `[storage] dir` from the config.
    #[arg(long, value_name = "DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Queue a single task.
    Add(AddArgs),
    /// Queue every task in a TOML batch file, all or nothing.
    Batch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Validate and print the plan without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// List tasks, highest priority first.
    List(ListArgs),
    /// Show one task by id or unique substring.
    Show {
        #[arg(value_name = "PATTERN")]
        pattern: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the dependency order of all tasks.
    Order,
    /// Run the scheduler.
    Run {
        /// Exit once nothing is running and nothing can start.
        #[arg(long)]
        once: bool,
        /// Override `[scheduler] max_concurrent`.
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,
    },
    /// Mark a running task cancelled.
    Cancel {
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },
    /// Delete a task and drop it from its dependents.
    Remove {
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },
    /// Delete terminal tasks older than the retention window.
    Cleanup {
        /// Override `[storage] retention`, e.g. `12h` or `7d`.
        #[arg(long, value_name = "DURATION")]
        older_than: Option<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    /// 1..=100, higher runs first.
    #[arg(long)]
    pub priority: Option<i64>,
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub depends_on: Vec<String>,
    /// What to do when a dependency fails: wait, skip or fail.
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<DependencyPolicy>,
    #[arg(long, default_value = "")]
    pub prompt: String,
    #[arg(long)]
    pub worktree: Option<String>,
    #[arg(long)]
    pub base_branch: Option<String>,
    #[arg(long)]
    pub repository: Option<PathBuf>,
    /// Verification command; repeat for several.
    #[arg(long = "verify", value_name = "CMD")]
    pub verify: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// A status, or `waiting` for pending tasks blocked on dependencies.
    #[arg(long, value_name = "STATUS")]
    pub status: Option<String>,
    #[arg(long, value_name = "N")]
    pub min_priority: Option<u8>,
    /// Only tasks created after this RFC 3339 timestamp.
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,
    #[arg(long)]
    pub json: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
