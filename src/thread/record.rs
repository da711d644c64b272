/*!
 * Thread Record
 *
 * Lifecycle state of one thread. Records are owned by the registry; the
 * running task and the identity slots only hold `Weak` references, so a
 * self-deleting task can never free its own record.
 */

use super::types::{ThreadOrigin, ThreadState};
use crate::core::limits::MAX_MODULE_NAME_LENGTH;
use crate::core::text::FixedText;
use crate::core::types::{ExitStatus, Pid, Priority, ThreadId};
use crate::scheduler::TaskHandle;
use parking_lot::{Mutex, MutexGuard};
use std::time::Instant;

pub type ThreadName = FixedText<MAX_MODULE_NAME_LENGTH>;

/// Mutable part of a record, guarded by the record lock
///
/// The lock is the critical section: it is held only for state
/// transitions and joiner registration, never across a blocking call.
#[derive(Debug)]
pub(crate) struct ThreadInner {
    pub state: ThreadState,
    pub joiner: Option<TaskHandle>,
    pub process: Pid,
    pub priority: Priority,
    pub task: Option<TaskHandle>,
    /// The backing task may still execute and can be deleted
    pub task_alive: bool,
    pub exit_status: Option<ExitStatus>,
}

#[derive(Debug)]
pub struct ThreadRecord {
    id: ThreadId,
    name: ThreadName,
    origin: ThreadOrigin,
    stack_size: usize,
    created: Instant,
    inner: Mutex<ThreadInner>,
}

impl ThreadRecord {
    pub(crate) fn managed(
        id: ThreadId,
        name: &str,
        priority: Priority,
        stack_size: usize,
        process: Pid,
    ) -> Self {
        Self {
            id,
            name: ThreadName::new(name),
            origin: ThreadOrigin::Managed,
            stack_size,
            created: Instant::now(),
            inner: Mutex::new(ThreadInner {
                state: ThreadState::Created,
                joiner: None,
                process,
                priority,
                task: None,
                task_alive: true,
                exit_status: None,
            }),
        }
    }

    /// Record for a context that never ran through the wrapped body
    ///
    /// Starts `Completed` since there is no body whose end could be
    /// observed; the task itself keeps running.
    pub(crate) fn adopted(
        id: ThreadId,
        name: &str,
        priority: Priority,
        task: TaskHandle,
        process: Pid,
    ) -> Self {
        Self {
            id,
            name: ThreadName::new(name),
            origin: ThreadOrigin::Adopted,
            stack_size: 0,
            created: Instant::now(),
            inner: Mutex::new(ThreadInner {
                state: ThreadState::Completed,
                joiner: None,
                process,
                priority,
                task: Some(task),
                task_alive: true,
                exit_status: None,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &ThreadName {
        &self.name
    }

    #[inline]
    pub fn origin(&self) -> ThreadOrigin {
        self.origin
    }

    /// Declared stack budget in bytes
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    #[inline]
    pub fn created(&self) -> Instant {
        self.created
    }

    pub fn state(&self) -> ThreadState {
        self.inner.lock().state
    }

    pub fn process(&self) -> Pid {
        self.inner.lock().process
    }

    pub fn priority(&self) -> Priority {
        self.inner.lock().priority
    }

    pub fn task(&self) -> Option<TaskHandle> {
        self.inner.lock().task
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.inner.lock().exit_status
    }

    pub fn has_joiner(&self) -> bool {
        self.inner.lock().joiner.is_some()
    }

    pub(crate) fn set_process(&self, process: Pid) {
        self.inner.lock().process = process;
    }

    pub(crate) fn set_priority(&self, priority: Priority) {
        self.inner.lock().priority = priority;
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ThreadInner> {
        self.inner.lock()
    }
}
