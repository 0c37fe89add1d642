// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{Config, RawConfigFile};
use crate::errors::{Result, TaskdagError};

impl TryFrom<RawConfigFile> for Config {
    type Error = TaskdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if raw.scheduler.max_concurrent == 0 {
            return Err(TaskdagError::ConfigError(
                "[scheduler].max_concurrent must be >= 1 (got 0)".to_string(),
            ));
        }

        let poll_interval = parse_setting("[scheduler].poll_interval", &raw.scheduler.poll_interval)?;
        if poll_interval.is_zero() {
            return Err(TaskdagError::ConfigError(
                "[scheduler].poll_interval must be greater than zero".to_string(),
            ));
        }

        let retention = parse_setting("[storage].retention", &raw.storage.retention)?;

        let task_timeout = raw
            .executor
            .task_timeout
            .as_deref()
            .map(|s| parse_setting("[executor].task_timeout", s))
            .transpose()?;

        let executor_command = raw
            .executor
            .command
            .filter(|cmd| !cmd.trim().is_empty());

        Ok(Config {
            storage_dir: raw.storage.dir,
            retention,
            max_concurrent: raw.scheduler.max_concurrent,
            poll_interval,
            exit_when_idle: raw.scheduler.exit_when_idle,
            executor_command,
            task_timeout,
            verify: raw.executor.verify,
        })
    }
}

fn parse_setting(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| TaskdagError::ConfigError(format!("{key}: {e}")))
}

/// Parse durations such as `"500ms"`, `"2s"`, `"10m"`, `"2h"` or `"7d"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        "d" => Ok(Duration::from_secs(value * 24 * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, h, or d",
            unit
        )),
    }
}
