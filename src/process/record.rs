/*!
 * Process Record
 * Grouping container with its own kill/wait state
 */

use super::types::{ProcessInfo, ProcessState};
use crate::core::limits::{DEFAULT_PWD, DEFAULT_UID, MAX_MODULE_NAME_LENGTH, MAX_PATH_LENGTH};
use crate::core::text::FixedText;
use crate::core::types::{ExitStatus, Pid, Uid};
use crate::scheduler::TaskHandle;
use parking_lot::{Mutex, MutexGuard};

pub type ProcessName = FixedText<MAX_MODULE_NAME_LENGTH>;
pub type ProcessPath = FixedText<MAX_PATH_LENGTH>;

#[derive(Debug)]
pub(crate) struct ProcessInner {
    pub state: ProcessState,
    pub uid: Uid,
    pub pwd: ProcessPath,
    pub exit_status: Option<ExitStatus>,
    pub waiter: Option<TaskHandle>,
}

#[derive(Debug)]
pub struct ProcessRecord {
    pid: Pid,
    name: ProcessName,
    parent: Option<Pid>,
    inner: Mutex<ProcessInner>,
}

impl ProcessRecord {
    pub(crate) fn new(pid: Pid, name: &str, parent: Option<Pid>, state: ProcessState) -> Self {
        Self {
            pid,
            name: ProcessName::new(name),
            parent,
            inner: Mutex::new(ProcessInner {
                state,
                uid: DEFAULT_UID,
                pwd: ProcessPath::new(DEFAULT_PWD),
                exit_status: None,
                waiter: None,
            }),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn name(&self) -> &ProcessName {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub fn uid(&self) -> Uid {
        self.inner.lock().uid
    }

    pub fn set_uid(&self, uid: Uid) {
        self.inner.lock().uid = uid;
    }

    pub fn pwd(&self) -> ProcessPath {
        self.inner.lock().pwd.clone()
    }

    pub fn set_pwd(&self, pwd: &str) {
        self.inner.lock().pwd = ProcessPath::new(pwd);
    }

    /// Exit status, available once the process has terminated
    pub fn exit_status(&self) -> Option<ExitStatus> {
        let inner = self.inner.lock();
        inner.state.is_terminated().then_some(inner.exit_status).flatten()
    }

    pub fn has_waiter(&self) -> bool {
        self.inner.lock().waiter.is_some()
    }

    pub fn info(&self) -> ProcessInfo {
        let inner = self.inner.lock();
        ProcessInfo {
            pid: self.pid,
            name: self.name.as_str().into(),
            state: inner.state,
            uid: inner.uid,
            pwd: inner.pwd.as_str().into(),
            exit_status: inner.exit_status,
            parent: self.parent,
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ProcessInner> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let record = ProcessRecord::new(2, "shell", Some(1), ProcessState::Running);
        assert_eq!(record.uid(), 0);
        assert_eq!(record.pwd().as_str(), "/");
        assert_eq!(record.parent(), Some(1));
        assert_eq!(record.exit_status(), None);
    }

    #[test]
    fn test_pwd_truncated() {
        let record = ProcessRecord::new(2, "shell", None, ProcessState::Running);
        record.set_pwd(&"d".repeat(400));
        assert_eq!(record.pwd().len(), MAX_PATH_LENGTH - 1);
    }

    #[test]
    fn test_exit_status_hidden_until_terminated() {
        let record = ProcessRecord::new(2, "shell", None, ProcessState::Running);
        record.lock().exit_status = Some(4);
        assert_eq!(record.exit_status(), None);
        record.lock().state = ProcessState::Terminated;
        assert_eq!(record.exit_status(), Some(4));
    }
}
