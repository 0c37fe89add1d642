// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use taskdag::config::{Config, load_and_validate, parse_duration, resolve_config};
use taskdag::errors::TaskdagError;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    let file = write_config("");
    let cfg = load_and_validate(file.path())?;
    let defaults = Config::default();

    assert_eq!(cfg.storage_dir, PathBuf::from(".taskdag/tasks"));
    assert_eq!(cfg.storage_dir, defaults.storage_dir);
    assert_eq!(cfg.retention, Duration::from_secs(7 * 24 * 60 * 60));
    assert_eq!(cfg.max_concurrent, 3);
    assert_eq!(cfg.poll_interval, Duration::from_secs(2));
    assert!(!cfg.exit_when_idle);
    assert!(cfg.executor_command.is_none());
    assert!(cfg.task_timeout.is_none());
    assert!(cfg.verify);
    Ok(())
}

#[test]
fn all_sections_are_read() -> TestResult {
    let file = write_config(
        r#"
[storage]
dir = "/var/lib/taskdag"
retention = "12h"

[scheduler]
max_concurrent = 5
poll_interval = "500ms"
exit_when_idle = true

[executor]
command = "run-agent"
task_timeout = "2h"
verify = false
"#,
    );
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.storage_dir, PathBuf::from("/var/lib/taskdag"));
    assert_eq!(cfg.retention, Duration::from_secs(12 * 60 * 60));
    assert_eq!(cfg.max_concurrent, 5);
    assert_eq!(cfg.poll_interval, Duration::from_millis(500));
    assert!(cfg.exit_when_idle);
    assert_eq!(cfg.executor_command.as_deref(), Some("run-agent"));
    assert_eq!(cfg.task_timeout, Some(Duration::from_secs(2 * 60 * 60)));
    assert!(!cfg.verify);
    Ok(())
}

#[test]
fn zero_concurrency_is_rejected() {
    let file = write_config("[scheduler]\nmax_concurrent = 0\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskdagError::ConfigError(msg)) if msg.contains("max_concurrent")
    ));
}

#[test]
fn bad_durations_name_their_key() {
    let file = write_config("[scheduler]\npoll_interval = \"soon\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskdagError::ConfigError(msg)) if msg.contains("poll_interval")
    ));

    let file = write_config("[scheduler]\npoll_interval = \"0s\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskdagError::ConfigError(_))
    ));
}

#[test]
fn unknown_keys_are_toml_errors() {
    let file = write_config("[scheduler]\nworkers = 4\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskdagError::TomlError(_))
    ));
}

#[test]
fn blank_executor_command_counts_as_unset() -> TestResult {
    let file = write_config("[executor]\ncommand = \"   \"\n");
    assert!(load_and_validate(file.path())?.executor_command.is_none());
    Ok(())
}

#[test]
fn explicit_config_path_must_exist() {
    let missing = PathBuf::from("/definitely/not/here/taskdag.toml");
    assert!(matches!(
        resolve_config(Some(missing.as_path())),
        Err(TaskdagError::IoError(_))
    ));
}

#[test]
fn parse_duration_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 10m "), Ok(Duration::from_secs(600)));
    assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86_400)));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("15").is_err());
    assert!(parse_duration("5y").is_err());
    assert!(parse_duration("ms").is_err());
}
