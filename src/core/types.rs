/*!
 * Core Types
 * Common types used across the lifecycle layer
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Process ID type
pub type Pid = u32;

/// User ID type
pub type Uid = u32;

/// Task priority (higher is more important)
pub type Priority = u8;

/// Exit status recorded by kill operations
pub type ExitStatus = i32;

/// Handle to a thread record owned by the thread registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeout {
    /// Fail immediately with `WouldBlock` if not ready
    NonBlocking,
    /// Wait at most this long, then fail with `TimedOut`
    After(Duration),
    /// Wait until ready
    Forever,
}

impl Timeout {
    /// C-style millisecond timeout: negative waits forever, zero never waits
    pub fn from_millis(ms: i32) -> Self {
        match ms {
            ms if ms < 0 => Timeout::Forever,
            0 => Timeout::NonBlocking,
            ms => Timeout::After(Duration::from_millis(ms as u64)),
        }
    }

    /// Requested wait in milliseconds, `None` for an unbounded wait
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Timeout::NonBlocking => Some(0),
            Timeout::After(d) => Some(d.as_millis() as u64),
            Timeout::Forever => None,
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(value: Option<Duration>) -> Self {
        match value {
            None => Timeout::Forever,
            Some(d) if d.is_zero() => Timeout::NonBlocking,
            Some(d) => Timeout::After(d),
        }
    }
}
