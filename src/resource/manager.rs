// src/resource/manager.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, TaskdagError};
use crate::task::TaskId;
use crate::types::ResourceCategory;

/// One bounded pool of execution slots.
///
/// The semaphore hands out capacity (FIFO among waiters); `active` mirrors
/// the number of granted slots and is only touched under its own lock, once
/// on grant and once on release.
#[derive(Debug)]
struct Pool {
    semaphore: Arc<Semaphore>,
    max: usize,
    active: RwLock<usize>,
}

#[derive(Debug)]
struct Inner {
    pools: HashMap<ResourceCategory, Pool>,
}

impl Inner {
    fn pool(&self, category: ResourceCategory) -> Result<&Pool> {
        self.pools
            .get(&category)
            .ok_or_else(|| TaskdagError::UnknownCategory(category.to_string()))
    }
}

/// Bounded-capacity allocator of execution slots per category.
///
/// Cheap to clone; clones share the same pools.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    inner: Arc<Inner>,
}

/// Point-in-time utilisation snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceStats {
    pub max_development: usize,
    pub active_development: usize,
    pub available_development: usize,
    pub utilization_percent: f64,
}

impl ResourceManager {
    /// Create a manager allowing `max_development` concurrent development
    /// slots. Clamped to at least 1; a zero-capacity pool could never grant.
    pub fn new(max_development: usize) -> Self {
        let max = max_development.max(1);
        let mut pools = HashMap::new();
        pools.insert(
            ResourceCategory::Development,
            Pool {
                semaphore: Arc::new(Semaphore::new(max)),
                max,
                active: RwLock::new(0),
            },
        );
        Self {
            inner: Arc::new(Inner { pools }),
        }
    }

    /// Wait until a slot is free or `cancel` fires.
    ///
    /// Cancellation never leaves the active count incremented: the count is
    /// only bumped once a permit is actually held.
    pub async fn acquire_slot(
        &self,
        cancel: &CancellationToken,
        category: ResourceCategory,
        owner: &str,
    ) -> Result<Slot> {
        let pool = self.inner.pool(category)?;
        let semaphore = Arc::clone(&pool.semaphore);

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(task = %owner, %category, "slot acquisition cancelled");
                return Err(TaskdagError::Cancelled);
            }
            permit = semaphore.acquire_owned() => {
                permit.map_err(|_| TaskdagError::Cancelled)?
            }
        };

        Ok(self.grant(category, owner, permit))
    }

    /// Non-blocking variant: `NoSlotsAvailable` if the pool is exhausted.
    pub fn try_acquire_slot(&self, category: ResourceCategory, owner: &str) -> Result<Slot> {
        let pool = self.inner.pool(category)?;
        match Arc::clone(&pool.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(self.grant(category, owner, permit)),
            Err(TryAcquireError::NoPermits) => {
                Err(TaskdagError::NoSlotsAvailable(category.to_string()))
            }
            Err(TryAcquireError::Closed) => Err(TaskdagError::Cancelled),
        }
    }

    /// [`ResourceManager::acquire_slot`] bounded by `timeout`.
    pub async fn wait_for_slot(
        &self,
        cancel: &CancellationToken,
        category: ResourceCategory,
        owner: &str,
        timeout: Duration,
    ) -> Result<Slot> {
        match tokio::time::timeout(timeout, self.acquire_slot(cancel, category, owner)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(task = %owner, %category, ?timeout, "timed out waiting for slot");
                Err(TaskdagError::Timeout(timeout))
            }
        }
    }

    /// Advisory only: another caller may take the slot first.
    pub fn can_acquire(&self, category: ResourceCategory) -> bool {
        self.inner
            .pool(category)
            .map(|pool| pool.semaphore.available_permits() > 0)
            .unwrap_or(false)
    }

    /// Snapshot of the development pool.
    pub fn get_stats(&self) -> ResourceStats {
        let (max, active) = self
            .inner
            .pool(ResourceCategory::Development)
            .map(|pool| {
                let active = *pool.active.read().unwrap_or_else(PoisonError::into_inner);
                (pool.max, active)
            })
            .unwrap_or((0, 0));

        let utilization_percent = if max == 0 {
            0.0
        } else {
            active as f64 / max as f64 * 100.0
        };

        ResourceStats {
            max_development: max,
            active_development: active,
            available_development: max.saturating_sub(active),
            utilization_percent,
        }
    }

    fn grant(&self, category: ResourceCategory, owner: &str, permit: OwnedSemaphorePermit) -> Slot {
        if let Ok(pool) = self.inner.pool(category) {
            let mut active = pool.active.write().unwrap_or_else(PoisonError::into_inner);
            *active += 1;
            debug!(task = %owner, %category, active = *active, max = pool.max, "slot acquired");
        }

        Slot {
            inner: Arc::clone(&self.inner),
            owner: owner.to_string(),
            category,
            acquired_at: Utc::now(),
            permit: Some(permit),
        }
    }
}

/// A lease on one execution slot.
///
/// Released exactly once: by [`Slot::release`] or, failing that, on drop.
/// Releasing an already-released slot is a no-op.
pub struct Slot {
    inner: Arc<Inner>,
    owner: TaskId,
    category: ResourceCategory,
    acquired_at: DateTime<Utc>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Slot {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn is_released(&self) -> bool {
        self.permit.is_none()
    }

    pub fn release(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };

        // Decrement before returning capacity, so a waiter woken by the permit
        // can never observe active > max.
        if let Ok(pool) = self.inner.pool(self.category) {
            let mut active = pool.active.write().unwrap_or_else(PoisonError::into_inner);
            *active = active.saturating_sub(1);
            debug!(task = %self.owner, category = %self.category, active = *active, "slot released");
        }
        drop(permit);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("owner", &self.owner)
            .field("category", &self.category)
            .field("acquired_at", &self.acquired_at)
            .field("released", &self.is_released())
            .finish()
    }
}
