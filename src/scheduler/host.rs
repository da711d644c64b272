/*!
 * Host Scheduler
 *
 * Scheduler port backed by std threads. Each task owns a wake token guarded
 * by a parking_lot mutex/condvar pair. Threads that call in without having
 * been spawned here (the test harness, `main`) are adopted on first use.
 *
 * A std thread cannot be stopped from outside, so forced deletion is
 * cooperative: the victim is flagged and unwinds with a [`TaskDeleted`]
 * payload at its next `delay`/`notify_take`. Tasks that never suspend run
 * to the end of their body.
 *
 * Adopted threads hold a thread-local lease that drops their table entries
 * when the thread exits.
 */

use super::ticks::ticks_to_duration;
use super::traits::Scheduler;
use super::types::{
    Blocking, SchedulerError, SchedulerResult, TaskBody, TaskDeleted, TaskHandle, TaskRunState,
    TaskSpec, TaskStatus, TickCount,
};
use crate::core::config::OsalConfig;
use crate::core::limits::{MAX_DELAY, STACK_WORD_BYTES};
use crate::core::types::Priority;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use smartstring::alias::String as SmartString;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, trace};

#[derive(Debug, Default)]
struct TaskSignal {
    notifications: u32,
    deleted: bool,
    blocked: bool,
}

struct TaskControl {
    handle: TaskHandle,
    name: SmartString,
    priority: AtomicU8,
    stack_bytes: usize,
    created: Instant,
    signal: Mutex<TaskSignal>,
    wake: Condvar,
}

impl TaskControl {
    fn new(handle: TaskHandle, name: SmartString, priority: Priority, stack_bytes: usize) -> Self {
        Self {
            handle,
            name,
            priority: AtomicU8::new(priority),
            stack_bytes,
            created: Instant::now(),
            signal: Mutex::new(TaskSignal::default()),
            wake: Condvar::new(),
        }
    }

    fn mark_deleted(&self) {
        self.signal.lock().deleted = true;
        self.wake.notify_all();
    }

    fn is_deleted(&self) -> bool {
        self.signal.lock().deleted
    }
}

type TaskTable = DashMap<TaskHandle, Arc<TaskControl>, RandomState>;
type ThreadTable = DashMap<thread::ThreadId, TaskHandle, RandomState>;

/// Removes an adopted thread's entries when that thread exits
struct AdoptionLease {
    tasks: Weak<TaskTable>,
    threads: Weak<ThreadTable>,
    handle: TaskHandle,
    thread: thread::ThreadId,
}

impl Drop for AdoptionLease {
    fn drop(&mut self) {
        if let Some(threads) = self.threads.upgrade() {
            threads.remove(&self.thread);
        }
        if let Some(tasks) = self.tasks.upgrade() {
            tasks.remove(&self.handle);
        }
    }
}

thread_local! {
    static ADOPTIONS: RefCell<Vec<AdoptionLease>> = const { RefCell::new(Vec::new()) };
}

/// Scheduler port running every task on its own OS thread
pub struct HostScheduler {
    tick_rate_hz: u32,
    max_tasks: usize,
    max_priorities: u8,
    min_stack_bytes: usize,
    adopted_priority: Priority,
    tasks: Arc<TaskTable>,
    threads: Arc<ThreadTable>,
    live: Arc<AtomicUsize>,
    epoch: Instant,
}

impl HostScheduler {
    pub fn new(config: &OsalConfig) -> Self {
        debug!(
            tick_rate_hz = config.tick_rate_hz,
            max_tasks = config.max_tasks,
            "Host scheduler started"
        );
        Self {
            tick_rate_hz: config.tick_rate_hz.max(1),
            max_tasks: config.max_tasks,
            max_priorities: config.max_priorities.max(1),
            min_stack_bytes: config.min_stack_bytes,
            adopted_priority: config.default_priority,
            tasks: Arc::new(DashMap::with_hasher(RandomState::new())),
            threads: Arc::new(DashMap::with_hasher(RandomState::new())),
            live: Arc::new(AtomicUsize::new(0)),
            epoch: Instant::now(),
        }
    }

    /// Number of spawned tasks whose thread is still running
    pub fn live_tasks(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    fn clamp_priority(&self, priority: Priority) -> Priority {
        priority.min(self.max_priorities - 1)
    }

    fn control(&self, task: TaskHandle) -> Option<Arc<TaskControl>> {
        self.tasks.get(&task).map(|entry| Arc::clone(entry.value()))
    }

    fn mapped_task(&self) -> Option<TaskHandle> {
        self.threads.get(&thread::current().id()).map(|entry| *entry)
    }

    fn adopt(&self) -> Arc<TaskControl> {
        let current = thread::current();
        let handle = TaskHandle::next();
        let name: SmartString = current.name().unwrap_or("adopted").into();
        let control = Arc::new(TaskControl::new(
            handle,
            name,
            self.clamp_priority(self.adopted_priority),
            0,
        ));
        self.tasks.insert(handle, Arc::clone(&control));
        self.threads.insert(current.id(), handle);

        let lease = AdoptionLease {
            tasks: Arc::downgrade(&self.tasks),
            threads: Arc::downgrade(&self.threads),
            handle,
            thread: current.id(),
        };
        if ADOPTIONS
            .try_with(|leases| leases.borrow_mut().push(lease))
            .is_err()
        {
            trace!(task = %handle, "Thread is exiting; adoption released at once");
        }
        trace!(task = %handle, name = %control.name, "Adopted foreign thread");
        control
    }

    fn current_control(&self) -> Arc<TaskControl> {
        self.mapped_task()
            .and_then(|task| self.control(task))
            .unwrap_or_else(|| self.adopt())
    }

    fn unwind_deleted(task: TaskHandle) -> ! {
        trace!(task = %task, "Unwinding deleted task");
        panic::resume_unwind(Box::new(TaskDeleted { task }))
    }

    fn status_of(&self, control: &TaskControl, current: Option<TaskHandle>) -> TaskStatus {
        let state = {
            let signal = control.signal.lock();
            if signal.deleted {
                TaskRunState::Deleted
            } else if current == Some(control.handle) {
                TaskRunState::Running
            } else if signal.blocked {
                TaskRunState::Blocked
            } else {
                TaskRunState::Ready
            }
        };
        TaskStatus {
            handle: control.handle,
            name: control.name.clone(),
            priority: control.priority.load(Ordering::Relaxed),
            state,
            stack_bytes: control.stack_bytes,
            uptime_ms: control.created.elapsed().as_millis() as u64,
        }
    }
}

impl Scheduler for HostScheduler {
    fn spawn(&self, spec: TaskSpec, body: TaskBody) -> SchedulerResult<TaskHandle> {
        let limit = self.max_tasks;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| SchedulerError::TaskLimit { limit })?;

        let handle = TaskHandle::next();
        let control = Arc::new(TaskControl::new(
            handle,
            spec.name.clone(),
            self.clamp_priority(spec.priority),
            spec.stack_bytes(),
        ));
        self.tasks.insert(handle, Arc::clone(&control));

        let stack = spec
            .stack_words
            .saturating_mul(STACK_WORD_BYTES)
            .max(self.min_stack_bytes);
        let tasks = Arc::clone(&self.tasks);
        let threads = Arc::clone(&self.threads);
        let live = Arc::clone(&self.live);

        let spawned = thread::Builder::new()
            .name(spec.name.to_string())
            .stack_size(stack)
            .spawn(move || {
                let os_thread = thread::current().id();
                threads.insert(os_thread, handle);

                // Deleted before it was ever scheduled
                if !control.is_deleted() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
                        if payload.downcast_ref::<TaskDeleted>().is_none() {
                            error!(task = %handle, "Task body panicked");
                        }
                    }
                }

                threads.remove(&os_thread);
                tasks.remove(&handle);
                live.fetch_sub(1, Ordering::AcqRel);
            });

        match spawned {
            Ok(_) => {
                debug!(task = %handle, name = %spec.name, stack, "Spawned task");
                Ok(handle)
            }
            Err(e) => {
                self.tasks.remove(&handle);
                self.live.fetch_sub(1, Ordering::AcqRel);
                Err(SchedulerError::SpawnFailed(e.to_string().into()))
            }
        }
    }

    fn delete_task(&self, task: TaskHandle) {
        match self.control(task) {
            Some(control) => {
                control.mark_deleted();
                debug!(task = %task, "Task deleted");
            }
            None => trace!(task = %task, "Delete of finished task ignored"),
        }
    }

    fn delete_current(&self) -> ! {
        let control = self.current_control();
        control.mark_deleted();
        Self::unwind_deleted(control.handle)
    }

    fn current_task(&self) -> TaskHandle {
        self.current_control().handle
    }

    fn delay(&self, ticks: TickCount) {
        let control = self.current_control();
        let deadline = if ticks == MAX_DELAY {
            None
        } else {
            ticks_to_duration(ticks, self.tick_rate_hz)
                .and_then(|d| Instant::now().checked_add(d))
        };

        let mut signal = control.signal.lock();
        loop {
            if signal.deleted {
                signal.blocked = false;
                drop(signal);
                Self::unwind_deleted(control.handle);
            }
            match deadline {
                Some(at) if Instant::now() >= at => break,
                Some(at) => {
                    signal.blocked = true;
                    if control.wake.wait_until(&mut signal, at).timed_out() && !signal.deleted {
                        break;
                    }
                }
                None => {
                    signal.blocked = true;
                    control.wake.wait(&mut signal);
                }
            }
        }
        signal.blocked = false;
        drop(signal);

        if ticks == 0 {
            thread::yield_now();
        }
    }

    fn notify_give(&self, task: TaskHandle) {
        match self.control(task) {
            Some(control) => {
                let mut signal = control.signal.lock();
                signal.notifications = signal.notifications.saturating_add(1);
                control.wake.notify_all();
            }
            None => trace!(task = %task, "Notify to finished task dropped"),
        }
    }

    fn notify_take(&self, blocking: Blocking) -> u32 {
        let control = self.current_control();
        let deadline = match blocking {
            Blocking::NoWait => Some(Instant::now()),
            Blocking::Ticks(ticks) => ticks_to_duration(ticks, self.tick_rate_hz)
                .and_then(|d| Instant::now().checked_add(d)),
            Blocking::Forever => None,
        };

        let mut signal = control.signal.lock();
        loop {
            if signal.deleted {
                signal.blocked = false;
                drop(signal);
                Self::unwind_deleted(control.handle);
            }
            if signal.notifications > 0 {
                signal.blocked = false;
                return std::mem::take(&mut signal.notifications);
            }
            match deadline {
                Some(at) if Instant::now() >= at => {
                    signal.blocked = false;
                    return 0;
                }
                Some(at) => {
                    signal.blocked = true;
                    // Loop re-checks deletion and the token after a timeout
                    let _ = control.wake.wait_until(&mut signal, at);
                }
                None => {
                    signal.blocked = true;
                    control.wake.wait(&mut signal);
                }
            }
        }
    }

    fn tick_count(&self) -> TickCount {
        let nanos = self.epoch.elapsed().as_nanos() * self.tick_rate_hz as u128 / 1_000_000_000;
        nanos.min(TickCount::MAX as u128) as TickCount
    }

    fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    fn priority(&self, task: TaskHandle) -> Option<Priority> {
        self.control(task)
            .map(|control| control.priority.load(Ordering::Relaxed))
    }

    fn set_priority(&self, task: TaskHandle, priority: Priority) -> SchedulerResult<()> {
        let control = self.control(task).ok_or(SchedulerError::UnknownTask(task))?;
        control
            .priority
            .store(self.clamp_priority(priority), Ordering::Relaxed);
        Ok(())
    }

    fn task_name(&self, task: TaskHandle) -> Option<SmartString> {
        self.control(task).map(|control| control.name.clone())
    }

    fn task_status(&self, task: TaskHandle) -> Option<TaskStatus> {
        let current = self.mapped_task();
        self.control(task)
            .map(|control| self.status_of(&control, current))
    }

    fn snapshot(&self) -> Vec<TaskStatus> {
        let current = self.mapped_task();
        let controls: Vec<Arc<TaskControl>> = self
            .tasks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut statuses: Vec<TaskStatus> = controls
            .iter()
            .map(|control| self.status_of(control, current))
            .collect();
        statuses.sort_by_key(|status| status.handle);
        statuses
    }
}

impl std::fmt::Debug for HostScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostScheduler")
            .field("tick_rate_hz", &self.tick_rate_hz)
            .field("max_tasks", &self.max_tasks)
            .field("live", &self.live_tasks())
            .finish()
    }
}
