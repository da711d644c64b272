/*!
 * Process Types
 * Process lifecycle states and reporting types
 */

use crate::core::types::{ExitStatus, Pid, Uid};
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// Process lifecycle
///
/// `Created -> Running -> Terminated`; transitions never go backwards.
/// `Zombie` is never entered by this layer but counts as terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Running,
    Terminated,
    Zombie,
}

impl ProcessState {
    #[inline]
    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated | Self::Zombie)
    }
}

/// Process information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: SmartString,
    pub state: ProcessState,
    pub uid: Uid,
    pub pwd: SmartString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<ExitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
}
