// src/batch/mod.rs

//! Batch task creation from a declarative TOML file.
//!
//! A batch is all-or-nothing: it is fully validated before the first task is
//! written, and tasks already written are deleted again if a later write
//! fails.

pub mod model;
pub mod validate;

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{Result, TaskdagError};
use crate::store::TaskStore;
use crate::task::Task;

pub use model::{BatchDefaults, BatchEntry, BatchFile, SUPPORTED_BATCH_VERSION};
pub use validate::plan_batch;

/// Just enough to read the version before the rest of the schema.
#[derive(Deserialize)]
struct VersionTag {
    version: Option<i64>,
}

/// Parse a batch document. A missing or unsupported version is an error.
pub fn parse_batch(contents: &str) -> Result<BatchFile> {
    let tag: VersionTag = toml::from_str(contents)?;
    match tag.version {
        Some(SUPPORTED_BATCH_VERSION) => {}
        Some(other) => {
            return Err(TaskdagError::BatchError(format!(
                "unsupported batch version {other} (expected {SUPPORTED_BATCH_VERSION})"
            )));
        }
        None => {
            return Err(TaskdagError::BatchError(
                "batch file is missing `version`".to_string(),
            ));
        }
    }

    let batch: BatchFile = toml::from_str(contents)?;
    Ok(batch)
}

pub fn load_batch(path: impl AsRef<Path>) -> Result<BatchFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_batch(&contents)
}

/// Validate `batch` against the store and create every task in it.
pub fn apply_batch(store: &TaskStore, batch: &BatchFile) -> Result<Vec<Task>> {
    let existing = store.list_tasks()?;
    let planned = plan_batch(batch, &existing, Utc::now())?;

    // A corrupt file is invisible to the listing but still occupies the id.
    for task in &planned {
        if store.exists(&task.id)? {
            return Err(TaskdagError::DuplicateId(task.id.clone()));
        }
    }

    let mut written: Vec<&Task> = Vec::with_capacity(planned.len());
    for task in &planned {
        if let Err(err) = store.save_task(task) {
            warn!(
                task = %task.id,
                error = %err,
                rolled_back = written.len(),
                "batch write failed; removing tasks already written"
            );
            for done in written {
                if let Err(e) = store.delete_task(&done.id) {
                    warn!(task = %done.id, error = %e, "failed to roll back batch task");
                }
            }
            return Err(err);
        }
        written.push(task);
    }

    info!(created = planned.len(), "batch applied");
    Ok(planned)
}
