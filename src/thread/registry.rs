/*!
 * Thread Registry
 *
 * Owns every thread record and implements the create/join/kill/destroy
 * protocol on top of the scheduler's spawn, delete and wake-token
 * primitives. Completion, kill and join registration all race; each is a
 * single transition under the record lock.
 */

use super::identity::IdentitySlots;
use super::record::ThreadRecord;
use super::types::{ThreadFilter, ThreadInfo, ThreadOrigin, ThreadRunState, ThreadState};
use crate::core::errors::{OsalError, OsalResult};
use crate::core::registration::Registration;
use crate::core::types::{ExitStatus, Pid, Priority, ThreadId};
use crate::scheduler::{Blocking, Scheduler, TaskDeleted, TaskHandle, TaskSpec};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

/// Creation request after defaults have been applied
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub name: &'a str,
    pub priority: Priority,
    pub stack_size: usize,
    pub process: Pid,
}

pub struct ThreadRegistry {
    scheduler: Arc<dyn Scheduler>,
    slots: Arc<IdentitySlots>,
    records: RwLock<BTreeMap<ThreadId, Arc<ThreadRecord>>>,
    next_id: AtomicU64,
}

impl ThreadRegistry {
    pub fn new(scheduler: Arc<dyn Scheduler>, slots: Arc<IdentitySlots>) -> Self {
        Self {
            scheduler,
            slots,
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn slots(&self) -> Arc<IdentitySlots> {
        Arc::clone(&self.slots)
    }

    fn allocate_id(&self) -> ThreadId {
        ThreadId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self, id: ThreadId) -> OsalResult<Arc<ThreadRecord>> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| OsalError::invalid(format!("unknown thread {}", id)))
    }

    /// Register a record for a context that was not spawned here
    pub(crate) fn adopt(&self, task: TaskHandle, name: &str, process: Pid) -> Arc<ThreadRecord> {
        let priority = self.scheduler.priority(task).unwrap_or_default();
        let record = Arc::new(ThreadRecord::adopted(
            self.allocate_id(),
            name,
            priority,
            task,
            process,
        ));
        self.records.write().insert(record.id(), Arc::clone(&record));
        record
    }

    /// Spawn a task running `entry` and register its record
    ///
    /// The record exists before the task so the body can find it; if the
    /// spawn fails the record is dropped without ever being registered.
    pub fn create<F>(&self, request: SpawnRequest<'_>, entry: F) -> OsalResult<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        if request.name.is_empty() {
            return Err(OsalError::invalid("thread name must not be empty"));
        }
        if request.stack_size == 0 {
            return Err(OsalError::invalid("thread stack size must be non-zero"));
        }

        let record = Arc::new(ThreadRecord::managed(
            self.allocate_id(),
            request.name,
            request.priority,
            request.stack_size,
            request.process,
        ));

        let spec = TaskSpec::new(record.name().as_str(), request.priority, request.stack_size);
        let scheduler = Arc::clone(&self.scheduler);
        let slots = Arc::clone(&self.slots);
        let weak = Arc::downgrade(&record);
        let body = Box::new(move || run_thread(scheduler, slots, weak, entry));

        let task = self.scheduler.spawn(spec, body).map_err(|e| {
            warn!(thread = %record.id(), name = %record.name(), error = %e, "Thread spawn failed");
            OsalError::from(e)
        })?;

        record.lock().task = Some(task);
        let id = record.id();
        self.records.write().insert(id, record);

        info!(
            thread = %id,
            task = %task,
            name = request.name,
            pid = request.process,
            "Created thread"
        );
        Ok(id)
    }

    /// Wait for a thread to finish; a record can be joined exactly once
    pub fn join(&self, id: ThreadId) -> OsalResult<()> {
        let record = self.get(id)?;
        let me = self.scheduler.current_task();

        {
            let mut inner = record.lock();
            if inner.state == ThreadState::Joined {
                return Err(OsalError::AlreadyJoined(id));
            }
            if inner.joiner.is_some() {
                return Err(OsalError::Busy(format!("thread {} already has a joiner", id).into()));
            }
            if inner.state.is_complete() {
                inner.state = ThreadState::Joined;
                return Ok(());
            }
            if inner.task == Some(me) {
                return Err(OsalError::invalid(format!("thread {} cannot join itself", id)));
            }
            inner.joiner = Some(me);
        }

        // Released if this task is deleted while blocked
        let registration = Registration::new(|| {
            let mut inner = record.lock();
            if inner.joiner == Some(me) {
                inner.joiner = None;
            }
        });

        loop {
            {
                let mut inner = record.lock();
                if inner.state.is_complete() {
                    inner.state = ThreadState::Joined;
                    inner.joiner = None;
                    break;
                }
            }
            // Tokens can be stale or meant for another wait; the state decides
            self.scheduler.notify_take(Blocking::Forever);
        }

        registration.disarm();
        debug!(thread = %id, "Joined thread");
        Ok(())
    }

    /// Terminate a thread; killing the caller's own thread does not return
    ///
    /// An adopted record whose task is still alive is killed like a managed
    /// one: it records the status and moves to `Killed`.
    pub fn kill(&self, id: ThreadId, status: ExitStatus) -> OsalResult<()> {
        let record = self.get(id)?;
        let me = self.scheduler.current_task();
        let adopted = record.origin() == ThreadOrigin::Adopted;

        let (joiner, target) = {
            let mut inner = record.lock();
            let adopted_alive =
                adopted && inner.task_alive && inner.state == ThreadState::Completed;
            if inner.state.is_live() || adopted_alive {
                inner.state = ThreadState::Killed;
                inner.exit_status = Some(status);
            }
            let target = if inner.task_alive {
                inner.task_alive = false;
                inner.task
            } else {
                None
            };
            (inner.joiner, target)
        };

        if let Some(joiner) = joiner {
            self.scheduler.notify_give(joiner);
        }

        match target {
            Some(task) if task == me => {
                info!(thread = %id, status, "Thread killed itself");
                self.slots.detach(task, &record);
                drop(record);
                self.scheduler.delete_current()
            }
            Some(task) => {
                info!(thread = %id, task = %task, status, "Killed thread");
                self.scheduler.delete_task(task);
            }
            None => trace!(thread = %id, "Kill of finished thread"),
        }
        Ok(())
    }

    /// Remove and free a record; unknown ids are ignored
    pub fn destroy(&self, id: ThreadId) {
        let Some(record) = self.records.write().remove(&id) else {
            debug!(thread = %id, "Destroy of unknown thread ignored");
            return;
        };
        let me = self.scheduler.current_task();

        let (joiner, target) = {
            let mut inner = record.lock();
            if let Some(task) = inner.task {
                self.slots.detach(task, &record);
            }
            let own = inner.task == Some(me);
            if inner.state.is_live() && !own {
                inner.state = ThreadState::Killed;
                let target = if inner.task_alive {
                    inner.task_alive = false;
                    inner.task
                } else {
                    None
                };
                (inner.joiner, target)
            } else {
                (None, None)
            }
        };

        if let Some(joiner) = joiner {
            self.scheduler.notify_give(joiner);
        }
        if let Some(task) = target {
            self.scheduler.delete_task(task);
        }
        debug!(thread = %id, "Destroyed thread");
    }

    /// Ids of records matching `filter`, ordered by id
    pub fn ids(&self, filter: ThreadFilter) -> Vec<ThreadId> {
        self.records
            .read()
            .values()
            .filter(|record| filter.matches(record.process()))
            .map(|record| record.id())
            .collect()
    }

    pub fn count(&self, filter: ThreadFilter) -> usize {
        self.records
            .read()
            .values()
            .filter(|record| filter.matches(record.process()))
            .count()
    }

    /// Write matching ids into `out`, returning the total number of matches
    ///
    /// Writes stop at `out.len()`; the return value does not.
    pub fn ids_into(&self, filter: ThreadFilter, out: &mut [ThreadId]) -> usize {
        let records = self.records.read();
        let mut matched = 0;
        for record in records.values() {
            if filter.matches(record.process()) {
                if let Some(slot) = out.get_mut(matched) {
                    *slot = record.id();
                }
                matched += 1;
            }
        }
        matched
    }

    pub fn info(&self, id: ThreadId) -> OsalResult<ThreadInfo> {
        let record = self.get(id)?;
        let (lifecycle, process, priority, task) = {
            let inner = record.lock();
            (inner.state, inner.process, inner.priority, inner.task)
        };

        let status = task.and_then(|task| self.scheduler.task_status(task));
        let run_state = match (&status, record.origin()) {
            (_, ThreadOrigin::Managed) if lifecycle.is_complete() => ThreadRunState::Terminated,
            (Some(status), _) => status.state.into(),
            (None, _) => ThreadRunState::Terminated,
        };

        Ok(ThreadInfo {
            id,
            name: record.name().as_str().into(),
            process,
            priority: status.as_ref().map_or(priority, |s| s.priority),
            lifecycle,
            run_state,
            stack_total: record.stack_size(),
            uptime_ms: record.created().elapsed().as_millis() as u64,
        })
    }

    pub fn set_priority(&self, id: ThreadId, priority: Priority) -> OsalResult<()> {
        let record = self.get(id)?;
        if let Some(task) = record.task() {
            // A finished task has no scheduler entry left to update
            if let Err(e) = self.scheduler.set_priority(task, priority) {
                trace!(thread = %id, error = %e, "Priority change on finished task");
            }
        }
        record.set_priority(priority);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// Wrapped body executed inside every managed task
fn run_thread<F>(
    scheduler: Arc<dyn Scheduler>,
    slots: Arc<IdentitySlots>,
    record: Weak<ThreadRecord>,
    entry: F,
) where
    F: FnOnce(),
{
    let task = scheduler.current_task();

    let started = record.upgrade().is_some_and(|record| {
        let mut inner = record.lock();
        inner.task = Some(task);
        if inner.state != ThreadState::Created {
            return false;
        }
        inner.state = ThreadState::Running;
        drop(inner);
        slots.attach(task, &record);
        true
    });
    if !started {
        // Killed or destroyed before it got to run
        scheduler.delete_current();
    }

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        if payload.is::<TaskDeleted>() {
            if let Some(record) = record.upgrade() {
                slots.detach(task, &record);
            }
            panic::resume_unwind(payload);
        }
        error!(task = %task, "Thread entry panicked");
    }

    if let Some(record) = record.upgrade() {
        let joiner = {
            let mut inner = record.lock();
            if inner.state == ThreadState::Running {
                inner.state = ThreadState::Completed;
            }
            inner.task_alive = false;
            slots.detach(task, &record);
            inner.joiner
        };
        if let Some(joiner) = joiner {
            scheduler.notify_give(joiner);
        }
        trace!(thread = %record.id(), "Thread body finished");
    }

    scheduler.delete_current();
}
