/*!
 * Thread Types
 * Lifecycle states, creation parameters and reporting types
 */

use crate::core::types::{Pid, Priority, ThreadId};
use crate::scheduler::TaskRunState;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// Lifecycle of a thread record
///
/// `Created -> Running -> {Completed | Killed} -> Joined`. No state is
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    Created,
    Running,
    Completed,
    Killed,
    Joined,
}

impl ThreadState {
    /// The backing task has stopped executing user code
    #[inline]
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Completed | Self::Killed | Self::Joined)
    }

    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

/// How a record came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadOrigin {
    /// Spawned through `thread_create` and runs the wrapped body
    Managed,
    /// Execution context discovered lazily by identity resolution
    Adopted,
}

/// Execution state reported by `thread_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadRunState {
    Running,
    Ready,
    Blocked,
    Suspended,
    Terminated,
}

impl From<TaskRunState> for ThreadRunState {
    fn from(state: TaskRunState) -> Self {
        match state {
            TaskRunState::Running => Self::Running,
            TaskRunState::Ready => Self::Ready,
            TaskRunState::Blocked => Self::Blocked,
            TaskRunState::Suspended => Self::Suspended,
            TaskRunState::Deleted => Self::Terminated,
        }
    }
}

/// Enumeration filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadFilter {
    #[default]
    All,
    Process(Pid),
}

impl ThreadFilter {
    #[inline]
    pub fn matches(self, process: Pid) -> bool {
        match self {
            Self::All => true,
            Self::Process(pid) => pid == process,
        }
    }
}

impl From<Option<Pid>> for ThreadFilter {
    fn from(process: Option<Pid>) -> Self {
        process.map_or(Self::All, Self::Process)
    }
}

/// Thread creation parameters
///
/// Unset fields fall back to the coordinator's configuration and the
/// caller's current process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub name: String,
    pub priority: Option<Priority>,
    pub stack_size: Option<usize>,
    pub process: Option<Pid>,
}

impl ThreadConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: None,
            stack_size: None,
            process: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Declared stack budget in bytes
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_process(mut self, pid: Pid) -> Self {
        self.process = Some(pid);
        self
    }
}

/// Point-in-time description of a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: SmartString,
    pub process: Pid,
    pub priority: Priority,
    pub lifecycle: ThreadState,
    pub run_state: ThreadRunState,
    pub stack_total: usize,
    pub uptime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(ThreadState::Created.is_live());
        assert!(ThreadState::Running.is_live());
        assert!(ThreadState::Completed.is_complete());
        assert!(ThreadState::Killed.is_complete());
        assert!(ThreadState::Joined.is_complete());
        assert!(!ThreadState::Running.is_complete());
    }

    #[test]
    fn test_filter() {
        assert!(ThreadFilter::All.matches(7));
        assert!(ThreadFilter::Process(7).matches(7));
        assert!(!ThreadFilter::Process(7).matches(8));
        assert_eq!(ThreadFilter::from(None), ThreadFilter::All);
        assert_eq!(ThreadFilter::from(Some(3)), ThreadFilter::Process(3));
    }

    #[test]
    fn test_config_builder() {
        let config = ThreadConfig::new("worker")
            .with_priority(5)
            .with_stack_size(2048)
            .with_process(2);
        assert_eq!(config.name, "worker");
        assert_eq!(config.priority, Some(5));
        assert_eq!(config.stack_size, Some(2048));
        assert_eq!(config.process, Some(2));
    }
}
