/*!
 * Scheduler Types
 * Handles, task descriptors and errors shared by every scheduler port
 */

use crate::core::errors::OsalError;
use crate::core::limits::STACK_WORD_BYTES;
use crate::core::types::Priority;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Scheduler tick counter
pub type TickCount = u64;

/// Body executed by a spawned task
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler operation result
pub type SchedulerResult<T> = Result<T, SchedulerError>;

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);

/// Opaque task identity owned by the scheduler
///
/// Handles are process-wide unique and never reused, so a stale handle can
/// only ever miss, never alias another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub u64);

impl TaskHandle {
    /// Allocate a fresh handle
    pub fn next() -> Self {
        TaskHandle(NEXT_TASK.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Parameters for spawning a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: SmartString,
    pub priority: Priority,
    /// Stack depth in words, not bytes
    pub stack_words: usize,
}

impl TaskSpec {
    /// Build a spec from a byte budget, rounding up to whole words
    pub fn new(name: &str, priority: Priority, stack_bytes: usize) -> Self {
        Self {
            name: name.into(),
            priority,
            stack_words: stack_bytes.div_ceil(STACK_WORD_BYTES),
        }
    }

    #[inline]
    pub fn stack_bytes(&self) -> usize {
        self.stack_words.saturating_mul(STACK_WORD_BYTES)
    }
}

/// How long `notify_take` may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    NoWait,
    Ticks(TickCount),
    Forever,
}

/// Scheduler-side view of a task's execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunState {
    Running,
    Ready,
    Blocked,
    Suspended,
    Deleted,
}

/// One entry of a system task snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub handle: TaskHandle,
    pub name: SmartString,
    pub priority: Priority,
    pub state: TaskRunState,
    pub stack_bytes: usize,
    pub uptime_ms: u64,
}

/// Unwind payload used when a task is force-deleted
///
/// Ports that cannot stop a thread asynchronously unwind it with this
/// payload at its next suspension point. Code that catches panics around
/// user bodies must re-raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDeleted {
    pub task: TaskHandle,
}

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task limit reached: {limit}")]
    TaskLimit { limit: usize },

    #[error("Spawn failed: {0}")]
    SpawnFailed(SmartString),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskHandle),
}

impl From<SchedulerError> for OsalError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::TaskLimit { .. } | SchedulerError::SpawnFailed(_) => {
                OsalError::AllocationFailure(err.to_string().into())
            }
            SchedulerError::UnknownTask(_) => OsalError::InvalidArgument(err.to_string().into()),
        }
    }
}
