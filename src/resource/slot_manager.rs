// src/resource/slot_manager.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::Result;
use crate::resource::{ResourceManager, Slot};
use crate::task::TaskId;
use crate::types::ResourceCategory;

/// Read-only description of a tracked slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub owner: TaskId,
    pub category: ResourceCategory,
    pub acquired_at: DateTime<Utc>,
}

impl From<&Slot> for SlotInfo {
    fn from(slot: &Slot) -> Self {
        Self {
            owner: slot.owner().to_string(),
            category: slot.category(),
            acquired_at: slot.acquired_at(),
        }
    }
}

/// Tracks at most one slot per task on top of a [`ResourceManager`].
///
/// Acquiring for a task that already holds a slot returns the existing
/// lease instead of taking a second one.
#[derive(Debug)]
pub struct SlotManager {
    resources: ResourceManager,
    category: ResourceCategory,
    slots: Mutex<HashMap<TaskId, Slot>>,
}

impl SlotManager {
    pub fn new(resources: ResourceManager) -> Self {
        Self {
            resources,
            category: ResourceCategory::Development,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Blocking acquire for `task`, idempotent per task.
    pub async fn acquire(&self, cancel: &CancellationToken, task: &str) -> Result<SlotInfo> {
        if let Some(existing) = self.get(task) {
            return Ok(existing);
        }

        // Never hold the map lock across the wait.
        let slot = self
            .resources
            .acquire_slot(cancel, self.category, task)
            .await?;
        Ok(self.track(task, slot))
    }

    /// Non-blocking acquire for `task`, idempotent per task.
    pub fn try_acquire(&self, task: &str) -> Result<SlotInfo> {
        if let Some(existing) = self.get(task) {
            return Ok(existing);
        }
        let slot = self.resources.try_acquire_slot(self.category, task)?;
        Ok(self.track(task, slot))
    }

    /// Release the slot held by `task`. Returns whether one was held.
    pub fn release(&self, task: &str) -> bool {
        let slot = self.lock().remove(task);
        match slot {
            Some(mut slot) => {
                slot.release();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, task: &str) -> Option<SlotInfo> {
        self.lock().get(task).map(SlotInfo::from)
    }

    pub fn holds(&self, task: &str) -> bool {
        self.lock().contains_key(task)
    }

    /// Tracked slots ordered by owner.
    pub fn active_slots(&self) -> Vec<SlotInfo> {
        let mut infos: Vec<SlotInfo> = self.lock().values().map(SlotInfo::from).collect();
        infos.sort_by(|a, b| a.owner.cmp(&b.owner));
        infos
    }

    /// Release every tracked slot. Used by shutdown and crash-recovery sweeps.
    pub fn release_all(&self) -> usize {
        let drained: Vec<(TaskId, Slot)> = self.lock().drain().collect();
        let count = drained.len();
        for (_, mut slot) in drained {
            slot.release();
        }
        if count > 0 {
            info!(released = count, "released all tracked slots");
        }
        count
    }

    fn track(&self, task: &str, slot: Slot) -> SlotInfo {
        let mut slots = self.lock();
        if let Some(existing) = slots.get(task) {
            // Lost a race with a concurrent acquire for the same task; the
            // extra slot is released when dropped.
            debug!(task = %task, "slot already tracked; releasing duplicate");
            return SlotInfo::from(existing);
        }
        let info = SlotInfo::from(&slot);
        slots.insert(task.to_string(), slot);
        info
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
