/*!
 * Identity Resolution
 *
 * Maps the calling task to its thread record. Every task has one identity
 * slot holding a weak reference to its record; contexts that were never
 * spawned through this layer get a record on first lookup.
 */

use super::record::ThreadRecord;
use super::registry::ThreadRegistry;
use crate::core::errors::{OsalError, OsalResult};
use crate::core::types::Pid;
use crate::scheduler::{Scheduler, TaskHandle};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Per-task identity slots
///
/// Side table from task handle to record. Entries are weak so a slot can
/// never keep a destroyed record alive.
#[derive(Debug)]
pub struct IdentitySlots {
    slots: DashMap<TaskHandle, Weak<ThreadRecord>, RandomState>,
}

impl Default for IdentitySlots {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySlots {
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn attach(&self, task: TaskHandle, record: &Arc<ThreadRecord>) {
        self.slots.insert(task, Arc::downgrade(record));
    }

    /// Record attached to `task`, if it still exists
    pub fn lookup(&self, task: TaskHandle) -> Option<Arc<ThreadRecord>> {
        let weak = self.slots.get(&task).map(|entry| entry.value().clone())?;
        weak.upgrade()
    }

    /// Clear the slot only if it still points at `record`
    pub fn detach(&self, task: TaskHandle, record: &ThreadRecord) -> bool {
        self.slots
            .remove_if(&task, |_, weak| std::ptr::eq(weak.as_ptr(), record))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

/// Process used for identity resolution while the root process is being
/// bootstrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    /// The initialising task; nobody else may resolve while this is set
    pub owner: TaskHandle,
    pub process: Pid,
}

/// Resolves the calling context to a durable thread record
pub struct IdentityResolver {
    scheduler: Arc<dyn Scheduler>,
    slots: Arc<IdentitySlots>,
    fallback: Mutex<Option<Fallback>>,
}

impl IdentityResolver {
    pub fn new(scheduler: Arc<dyn Scheduler>, slots: Arc<IdentitySlots>) -> Self {
        Self {
            scheduler,
            slots,
            fallback: Mutex::new(None),
        }
    }

    pub fn set_fallback(&self, fallback: Fallback) {
        debug!(owner = %fallback.owner, pid = fallback.process, "Identity fallback set");
        *self.fallback.lock() = Some(fallback);
    }

    pub fn clear_fallback(&self) {
        if self.fallback.lock().take().is_some() {
            debug!("Identity fallback cleared");
        }
    }

    pub fn fallback(&self) -> Option<Fallback> {
        *self.fallback.lock()
    }

    /// Record attached to the calling task, without adopting
    pub fn peek_current(&self) -> Option<Arc<ThreadRecord>> {
        self.slots.lookup(self.scheduler.current_task())
    }

    /// Record of the calling task, adopting the context on first call
    ///
    /// `current_process` is consulted only when no fallback is set; during
    /// bootstrap it would need the very record being created.
    pub fn resolve_current<F>(
        &self,
        registry: &ThreadRegistry,
        current_process: F,
    ) -> OsalResult<Arc<ThreadRecord>>
    where
        F: FnOnce() -> Pid,
    {
        let task = self.scheduler.current_task();
        if let Some(record) = self.slots.lookup(task) {
            return Ok(record);
        }

        let process = match self.fallback() {
            Some(fallback) if fallback.owner == task => fallback.process,
            Some(fallback) => {
                return Err(OsalError::invalid(format!(
                    "{} resolved identity while {} is bootstrapping",
                    task, fallback.owner
                )))
            }
            None => current_process(),
        };

        let name = self
            .scheduler
            .task_name(task)
            .unwrap_or_else(|| "adopted".into());
        let record = registry.adopt(task, &name, process);
        self.slots.attach(task, &record);
        trace!(task = %task, thread = %record.id(), pid = process, "Adopted execution context");
        Ok(record)
    }
}
