// src/store/mod.rs

//! Durable, file-per-task persistence.
//!
//! Every task lives in `<dir>/<id>.json`. There is no index and no cache:
//! the directory listing is the source of truth, so tasks can be inspected
//! or repaired with ordinary file tools.
//!
//! One `RwLock` guards the whole store; read-modify-write sequences
//! (status updates, cleanup) hold the write side for their full duration.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskdagError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::task::{Task, TaskResult, TaskStatus, apply_status, validate_id};

const TASK_FILE_EXT: &str = "json";

#[derive(Debug)]
pub struct TaskStore {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    lock: RwLock<()>,
}

impl TaskStore {
    /// Store backed by the real filesystem.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_fs(dir, Arc::new(RealFileSystem))
    }

    pub fn with_fs(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let dir = dir.into();
        fs.create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "task store opened");
        Ok(Self {
            dir,
            fs,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn task_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{TASK_FILE_EXT}"))
    }

    pub fn save_task(&self, task: &Task) -> Result<()> {
        let _guard = self.write_guard()?;
        self.write_unlocked(task)
    }

    /// Load one task. Missing is `NotFound`; a corrupt file is an error.
    pub fn load_task(&self, id: &str) -> Result<Task> {
        let _guard = self.read_guard()?;
        self.read_unlocked(id)
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let _guard = self.read_guard()?;
        Ok(self.fs.exists(&self.task_path(id)))
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let _guard = self.write_guard()?;
        let path = self.task_path(id);
        if !self.fs.exists(&path) {
            return Err(TaskdagError::NotFound(id.to_string()));
        }
        self.fs.remove_file(&path)?;
        debug!(task = %id, "task file deleted");
        Ok(())
    }

    /// All readable tasks, ordered by creation time then id.
    ///
    /// Unreadable or unparseable files are skipped with a warning.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let _guard = self.read_guard()?;
        self.list_unlocked()
    }

    /// Apply a lifecycle transition and persist it.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        self.update_task(id, |task| {
            apply_status(task, status, Utc::now())?;
            Ok(())
        })
    }

    /// Like [`TaskStore::update_task_status`], but a task already in
    /// `status` is an `InvalidTransition` rather than a no-op, so a caller
    /// that lost a race finds out.
    pub fn advance_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        self.update_task(id, |task| {
            if apply_status(task, status, Utc::now())? {
                Ok(())
            } else {
                Err(TaskdagError::InvalidTransition {
                    task: task.id.clone(),
                    from: task.status,
                    to: status,
                })
            }
        })
    }

    pub fn update_task_result(&self, id: &str, result: TaskResult) -> Result<Task> {
        self.update_task(id, |task| {
            task.result = Some(result);
            Ok(())
        })
    }

    /// Read-modify-write one task under the store's write lock.
    ///
    /// Nothing is written if `f` fails.
    pub fn update_task<F>(&self, id: &str, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let _guard = self.write_guard()?;
        let mut task = self.read_unlocked(id)?;
        f(&mut task)?;
        if task.id != id {
            return Err(TaskdagError::InvalidId(task.id));
        }
        self.write_unlocked(&task)?;
        Ok(task)
    }

    pub fn find_task_by_session_id(&self, session_id: &str) -> Result<Option<Task>> {
        Ok(self
            .list_tasks()?
            .into_iter()
            .find(|t| t.session_id.as_deref() == Some(session_id)))
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        Ok(self
            .list_tasks()?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    /// Tasks that have not started yet, including those still waiting on
    /// dependencies (waiting is not a stored status).
    pub fn get_pending_tasks(&self) -> Result<Vec<Task>> {
        self.get_tasks_by_status(TaskStatus::Pending)
    }

    /// Delete terminal tasks that completed more than `older_than` ago.
    pub fn cleanup(&self, older_than: std::time::Duration) -> Result<usize> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| TaskdagError::ConfigError(format!("retention out of range: {e}")))?;
        self.cleanup_before(Utc::now() - age)
    }

    /// Delete terminal tasks whose `completed_at` is before `cutoff`.
    ///
    /// Non-terminal tasks are kept regardless of age. Returns how many
    /// tasks were removed.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_guard()?;
        let mut removed = 0;

        for task in self.list_unlocked()? {
            let expired = task.is_terminal()
                && task.completed_at.is_some_and(|done| done < cutoff);
            if !expired {
                continue;
            }
            self.fs.remove_file(&self.task_path(&task.id))?;
            debug!(task = %task.id, status = %task.status, "expired task removed");
            removed += 1;
        }

        info!(removed, %cutoff, "task cleanup finished");
        Ok(removed)
    }

    fn read_unlocked(&self, id: &str) -> Result<Task> {
        validate_id(id)?;
        let path = self.task_path(id);
        if !self.fs.exists(&path) {
            return Err(TaskdagError::NotFound(id.to_string()));
        }
        let contents = self.fs.read_to_string(&path)?;
        let task: Task = serde_json::from_str(&contents)?;
        Ok(task)
    }

    fn write_unlocked(&self, task: &Task) -> Result<()> {
        validate_id(&task.id)?;
        let json = serde_json::to_string_pretty(task)?;
        self.fs.write_atomic(&self.task_path(&task.id), json.as_bytes())?;
        debug!(task = %task.id, status = %task.status, "task saved");
        Ok(())
    }

    fn list_unlocked(&self) -> Result<Vec<Task>> {
        if !self.fs.exists(&self.dir) {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        for path in self.fs.read_dir(&self.dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some(TASK_FILE_EXT) {
                continue;
            }
            let parsed = self
                .fs
                .read_to_string(&path)
                .and_then(|s| serde_json::from_str::<Task>(&s).map_err(anyhow::Error::from));
            match parsed {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable task file");
                }
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|_| TaskdagError::Other(anyhow!("task store lock poisoned")))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|_| TaskdagError::Other(anyhow!("task store lock poisoned")))
    }
}
