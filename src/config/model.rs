// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from `taskdag.toml`.
///
/// ```toml
/// [storage]
/// dir = ".taskdag/tasks"
/// retention = "7d"
///
/// [scheduler]
/// max_concurrent = 3
/// poll_interval = "2s"
///
/// [executor]
/// command = "agent-run --prompt \"$TASKDAG_PROMPT\""
/// task_timeout = "2h"
/// ```
///
/// All sections are optional and have reasonable defaults. This raw form
/// keeps durations as strings; [`Config`] is the validated form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub executor: ExecutorSection,
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Directory holding one JSON file per task.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    /// How long terminal tasks are kept before `cleanup` removes them.
    #[serde(default = "default_retention")]
    pub retention: String,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".taskdag/tasks")
}

fn default_retention() -> String {
    "7d".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            retention: default_retention(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Maximum number of tasks executing at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How often the loop re-reads the store when nothing completes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Stop once nothing is running and nothing is ready.
    #[serde(default)]
    pub exit_when_idle: bool,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            exit_when_idle: false,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    /// Shell command run once per task. Without it `run` refuses to start.
    #[serde(default)]
    pub command: Option<String>,

    /// Kill a task that runs longer than this.
    #[serde(default)]
    pub task_timeout: Option<String>,

    /// Run each task's verification commands after a zero exit.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_verify() -> bool {
    true
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            command: None,
            task_timeout: None,
            verify: default_verify(),
        }
    }
}

/// Validated configuration used by the rest of the crate.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub retention: Duration,
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub exit_when_idle: bool,
    pub executor_command: Option<String>,
    pub task_timeout: Option<Duration>,
    pub verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            max_concurrent: default_max_concurrent(),
            poll_interval: Duration::from_secs(2),
            exit_when_idle: false,
            executor_command: None,
            task_timeout: None,
            verify: default_verify(),
        }
    }
}
