/*!
 * Process Registry
 *
 * Owns process records and implements kill/wait one level above threads.
 * There is no process directory: name and id lookup only ever resolve the
 * root process.
 */

use super::record::ProcessRecord;
use super::types::ProcessState;
use crate::core::errors::{OsalError, OsalResult};
use crate::core::limits::FIRST_PID;
use crate::core::registration::Registration;
use crate::core::types::{ExitStatus, Pid, Timeout};
use crate::scheduler::{duration_to_ticks, Blocking, Scheduler};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pid value meaning "no root process"
const NO_ROOT: Pid = 0;

pub struct ProcessRegistry {
    scheduler: Arc<dyn Scheduler>,
    processes: DashMap<Pid, Arc<ProcessRecord>, RandomState>,
    next_pid: AtomicU32,
    root: AtomicU32,
}

impl ProcessRegistry {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            processes: DashMap::with_hasher(RandomState::new()),
            next_pid: AtomicU32::new(FIRST_PID),
            root: AtomicU32::new(NO_ROOT),
        }
    }

    fn allocate_pid(&self) -> Pid {
        self.next_pid.fetch_add(1, Ordering::SeqCst)
    }

    fn insert(&self, name: &str, parent: Option<Pid>, state: ProcessState) -> Arc<ProcessRecord> {
        let record = Arc::new(ProcessRecord::new(self.allocate_pid(), name, parent, state));
        self.processes.insert(record.pid(), Arc::clone(&record));
        record
    }

    /// Create a process; it starts `Running`
    pub fn create(&self, name: Option<&str>, parent: Option<Pid>) -> OsalResult<Pid> {
        if let Some(parent) = parent {
            if !self.processes.contains_key(&parent) {
                return Err(OsalError::invalid(format!("unknown parent process {}", parent)));
            }
        }
        let record = self.insert(name.unwrap_or_default(), parent, ProcessState::Running);
        info!(pid = record.pid(), name = %record.name(), parent = ?parent, "Created process");
        Ok(record.pid())
    }

    /// Create the root process in `Created`; it runs once bootstrap finishes
    pub fn create_root(&self, name: &str) -> Pid {
        let record = self.insert(name, None, ProcessState::Created);
        self.root.store(record.pid(), Ordering::SeqCst);
        debug!(pid = record.pid(), name, "Created root process");
        record.pid()
    }

    pub fn root(&self) -> Option<Pid> {
        match self.root.load(Ordering::SeqCst) {
            NO_ROOT => None,
            pid => Some(pid),
        }
    }

    pub fn get(&self, pid: Pid) -> OsalResult<Arc<ProcessRecord>> {
        self.processes
            .get(&pid)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| OsalError::invalid(format!("unknown process {}", pid)))
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }

    /// `Created -> Running`; other states are left alone
    pub fn mark_running(&self, pid: Pid) -> OsalResult<()> {
        let record = self.get(pid)?;
        let mut inner = record.lock();
        if inner.state == ProcessState::Created {
            inner.state = ProcessState::Running;
        }
        Ok(())
    }

    /// Mark a process `Terminated` with `status`, waking its waiter
    ///
    /// The first kill wins. Threads of the process are left running.
    pub fn kill(&self, pid: Pid, status: ExitStatus) -> OsalResult<()> {
        let record = self.get(pid)?;
        let waiter = {
            let mut inner = record.lock();
            if inner.state.is_terminated() {
                debug!(pid, "Process already terminated");
                return Ok(());
            }
            inner.state = ProcessState::Terminated;
            inner.exit_status = Some(status);
            inner.waiter
        };

        if let Some(waiter) = waiter {
            self.scheduler.notify_give(waiter);
        }
        info!(pid, status, "Killed process");
        Ok(())
    }

    /// Wait for a process to terminate
    ///
    /// Only one task may wait at a time. The waiter slot is released on
    /// every exit path, including timeout and forced deletion.
    pub fn wait(&self, pid: Pid, timeout: Timeout) -> OsalResult<()> {
        let record = self.get(pid)?;
        let me = self.scheduler.current_task();

        {
            let mut inner = record.lock();
            if inner.state.is_terminated() {
                return Ok(());
            }
            if inner.waiter.is_some() {
                return Err(OsalError::Busy(format!("process {} already has a waiter", pid).into()));
            }
            if timeout == Timeout::NonBlocking {
                return Err(OsalError::WouldBlock);
            }
            inner.waiter = Some(me);
        }

        let _registration = Registration::new(|| {
            let mut inner = record.lock();
            if inner.waiter == Some(me) {
                inner.waiter = None;
            }
        });

        let rate = self.scheduler.tick_rate_hz();
        let deadline = match timeout {
            Timeout::After(duration) => Some(
                self.scheduler
                    .tick_count()
                    .saturating_add(duration_to_ticks(duration, rate)),
            ),
            Timeout::NonBlocking | Timeout::Forever => None,
        };

        loop {
            if record.lock().state.is_terminated() {
                debug!(pid, "Process wait satisfied");
                return Ok(());
            }
            let blocking = match deadline {
                None => Blocking::Forever,
                Some(deadline) => {
                    let now = self.scheduler.tick_count();
                    if now >= deadline {
                        debug!(pid, "Process wait timed out");
                        return Err(OsalError::TimedOut {
                            timeout_ms: timeout.as_millis().unwrap_or_default(),
                        });
                    }
                    Blocking::Ticks(deadline - now)
                }
            };
            self.scheduler.notify_take(blocking);
        }
    }

    /// Remove and free a process; unknown pids are ignored
    ///
    /// A live process is marked terminated first so a blocked waiter
    /// returns instead of waiting on a record nobody can kill anymore.
    pub fn destroy(&self, pid: Pid, thread_references: usize) {
        let Some((_, record)) = self.processes.remove(&pid) else {
            debug!(pid, "Destroy of unknown process ignored");
            return;
        };
        if thread_references > 0 {
            warn!(
                pid,
                threads = thread_references,
                "Destroying process that still owns threads"
            );
        }
        let _ = self
            .root
            .compare_exchange(pid, NO_ROOT, Ordering::SeqCst, Ordering::SeqCst);

        let waiter = {
            let mut inner = record.lock();
            if !inner.state.is_terminated() {
                inner.state = ProcessState::Terminated;
            }
            inner.waiter
        };
        if let Some(waiter) = waiter {
            self.scheduler.notify_give(waiter);
        }
        debug!(pid, "Destroyed process");
    }

    /// Lookup by name; only the root process can be found
    pub fn find_by_name(&self, name: &str) -> OsalResult<Pid> {
        let root = self.root().and_then(|pid| self.get(pid).ok());
        match root {
            Some(record) if record.name() == name => Ok(record.pid()),
            _ => Err(OsalError::Unsupported(
                format!("no directory entry for process '{}'", name).into(),
            )),
        }
    }

    /// Lookup by id; only the root process can be found
    pub fn find_by_id(&self, pid: Pid) -> OsalResult<Pid> {
        match self.root() {
            Some(root) if root == pid && self.contains(pid) => Ok(pid),
            _ => Err(OsalError::Unsupported(
                format!("no directory entry for process {}", pid).into(),
            )),
        }
    }

    /// Live pids in ascending order
    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.processes.iter().map(|entry| *entry.key()).collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
