/*!
 * Lifecycle Coordinator
 *
 * Composition root of the layer. Owns the boot phase, publishes the per-run
 * context and routes thread creation to its default process.
 *
 * Boot protocol:
 * 1. `Uninitialized -> Bootstrapping`: build the context and a root
 *    process in `Created`
 * 2. Point the identity fallback at the root so adopting the caller does
 *    not need to ask for "the current process"
 * 3. Adopt the caller, clear the fallback, mark the root `Running`
 * 4. `Bootstrapping -> Ready`
 */

use super::builder::LifecycleCoordinatorBuilder;
use super::context::Context;
use crate::core::config::OsalConfig;
use crate::core::errors::{OsalError, OsalResult};
use crate::core::types::{ExitStatus, Pid, Priority, ThreadId, Timeout, Uid};
use crate::monitoring::traced;
use crate::process::{ProcessInfo, ProcessState};
use crate::scheduler::{ms_to_ticks, Scheduler, TickCount};
use crate::sync::{BoundedQueue, OsalMutex, Semaphore, SoftwareTimer};
use crate::thread::{
    Fallback, SpawnRequest, ThreadConfig, ThreadFilter, ThreadInfo, ThreadRecord,
};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Initialization phase of the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    Uninitialized,
    Bootstrapping,
    Ready,
}

pub struct LifecycleCoordinator {
    scheduler: Arc<dyn Scheduler>,
    config: OsalConfig,
    phase: Mutex<BootPhase>,
    context: ArcSwapOption<Context>,
}

impl LifecycleCoordinator {
    /// Coordinator on a private host scheduler
    pub fn new(config: OsalConfig) -> OsalResult<Self> {
        LifecycleCoordinatorBuilder::new().with_config(config).build()
    }

    pub fn builder() -> LifecycleCoordinatorBuilder {
        LifecycleCoordinatorBuilder::new()
    }

    pub(super) fn from_parts(scheduler: Arc<dyn Scheduler>, config: OsalConfig) -> Self {
        Self {
            scheduler,
            config,
            phase: Mutex::new(BootPhase::Uninitialized),
            context: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &OsalConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn phase(&self) -> BootPhase {
        *self.phase.lock()
    }

    pub fn is_initialized(&self) -> bool {
        self.phase() == BootPhase::Ready
    }

    fn ctx(&self) -> OsalResult<Arc<Context>> {
        self.context.load_full().ok_or(OsalError::NotInitialized)
    }

    // =========================================================================
    // INIT / DEINIT
    // =========================================================================

    /// Bring the layer up and adopt the calling context
    ///
    /// Must run before any other task calls into the layer. Calling it
    /// again while initialized is a no-op.
    pub fn init(&self) -> OsalResult<()> {
        let mut phase = self.phase.lock();
        if *phase != BootPhase::Uninitialized {
            info!(phase = ?*phase, "Lifecycle layer already initialized");
            return Ok(());
        }
        *phase = BootPhase::Bootstrapping;

        let owner = self.scheduler.current_task();
        let context = Arc::new(Context::new(Arc::clone(&self.scheduler), &self.config));
        context.resolver.set_fallback(Fallback {
            owner,
            process: context.root,
        });
        self.context.store(Some(Arc::clone(&context)));

        let boot = context.current_thread();
        context.resolver.clear_fallback();

        let record = match boot.and_then(|record| {
            context.processes.mark_running(context.root)?;
            Ok(record)
        }) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Lifecycle bootstrap failed");
                self.context.store(None);
                *phase = BootPhase::Uninitialized;
                return Err(e);
            }
        };

        *phase = BootPhase::Ready;
        info!(
            root = context.root,
            thread = %record.id(),
            task = %owner,
            "Lifecycle layer initialized"
        );
        Ok(())
    }

    /// Tear the layer down; a no-op when not initialized
    pub fn deinit(&self) -> OsalResult<()> {
        let mut phase = self.phase.lock();
        if *phase == BootPhase::Uninitialized {
            debug!("Lifecycle layer not initialized");
            return Ok(());
        }

        if let Some(context) = self.context.swap(None) {
            context.resolver.clear_fallback();
            if let Some(record) = context.resolver.peek_current() {
                context.threads.destroy(record.id());
            }
            let references = context.threads.count(ThreadFilter::Process(context.root));
            context.processes.destroy(context.root, references);

            let remaining = context.threads.len();
            if remaining > 0 {
                warn!(threads = remaining, "Threads still registered at deinit");
            }
            context.threads.slots().clear();
        }

        *phase = BootPhase::Uninitialized;
        info!("Lifecycle layer deinitialized");
        Ok(())
    }

    // =========================================================================
    // THREADS
    // =========================================================================

    /// Spawn a thread running `entry`
    ///
    /// Without an explicit process the thread joins the caller's process.
    pub fn thread_create<F>(&self, config: ThreadConfig, entry: F) -> OsalResult<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        let ctx = self.ctx()?;
        let process = match config.process {
            Some(pid) => ctx.processes.get(pid)?.pid(),
            None => ctx.current_process(),
        };
        let request = SpawnRequest {
            name: &config.name,
            priority: self.clamp_priority(config.priority.unwrap_or(self.config.default_priority)),
            stack_size: config.stack_size.unwrap_or(self.config.default_stack_size),
            process,
        };
        ctx.threads.create(request, entry)
    }

    /// Block until `id` completes; each thread can be joined once
    pub fn thread_join(&self, id: ThreadId) -> OsalResult<()> {
        let ctx = self.ctx()?;
        traced("thread_join", id, || ctx.threads.join(id))
    }

    /// Terminate `id`; killing the calling thread does not return
    pub fn thread_kill(&self, id: ThreadId, status: ExitStatus) -> OsalResult<()> {
        self.ctx()?.threads.kill(id, status)
    }

    /// Release a thread record; unknown ids are ignored
    pub fn thread_destroy(&self, id: ThreadId) -> OsalResult<()> {
        self.ctx()?.threads.destroy(id);
        Ok(())
    }

    pub fn thread_current(&self) -> OsalResult<ThreadId> {
        Ok(self.ctx()?.current_thread()?.id())
    }

    fn thread_record(&self, ctx: &Context, id: Option<ThreadId>) -> OsalResult<Arc<ThreadRecord>> {
        match id {
            Some(id) => ctx.threads.get(id),
            None => ctx.current_thread(),
        }
    }

    pub fn thread_name(&self, id: Option<ThreadId>) -> OsalResult<SmartString> {
        let ctx = self.ctx()?;
        Ok(self.thread_record(&ctx, id)?.name().as_str().into())
    }

    pub fn thread_priority(&self, id: Option<ThreadId>) -> OsalResult<Priority> {
        let ctx = self.ctx()?;
        let record = self.thread_record(&ctx, id)?;
        Ok(record
            .task()
            .and_then(|task| self.scheduler.priority(task))
            .unwrap_or_else(|| record.priority()))
    }

    pub fn set_thread_priority(&self, id: Option<ThreadId>, priority: Priority) -> OsalResult<()> {
        let ctx = self.ctx()?;
        let record = self.thread_record(&ctx, id)?;
        ctx.threads
            .set_priority(record.id(), self.clamp_priority(priority))
    }

    pub fn thread_process(&self, id: Option<ThreadId>) -> OsalResult<Pid> {
        let ctx = self.ctx()?;
        Ok(self.thread_record(&ctx, id)?.process())
    }

    /// Name of the process a thread belongs to
    pub fn thread_module_name(&self, id: Option<ThreadId>) -> OsalResult<SmartString> {
        let ctx = self.ctx()?;
        let pid = self.thread_record(&ctx, id)?.process();
        Ok(ctx.processes.get(pid)?.name().as_str().into())
    }

    pub fn thread_info(&self, id: Option<ThreadId>) -> OsalResult<ThreadInfo> {
        let ctx = self.ctx()?;
        let id = self.thread_record(&ctx, id)?.id();
        ctx.threads.info(id)
    }

    /// Ids of matching threads, ordered by id
    pub fn threads(&self, filter: ThreadFilter) -> OsalResult<Vec<ThreadId>> {
        Ok(self.ctx()?.threads.ids(filter))
    }

    pub fn thread_count(&self, filter: ThreadFilter) -> OsalResult<usize> {
        Ok(self.ctx()?.threads.count(filter))
    }

    /// Fill `out` with matching ids; returns the total match count, which
    /// may exceed `out.len()`
    pub fn threads_into(&self, filter: ThreadFilter, out: &mut [ThreadId]) -> OsalResult<usize> {
        Ok(self.ctx()?.threads.ids_into(filter, out))
    }

    /// Suspend the caller for at least one tick per nonzero request
    pub fn sleep(&self, ms: u64) -> OsalResult<()> {
        self.ctx()?;
        self.scheduler
            .delay(ms_to_ticks(ms, self.scheduler.tick_rate_hz()));
        Ok(())
    }

    pub fn tick_count(&self) -> OsalResult<TickCount> {
        self.ctx()?;
        Ok(self.scheduler.tick_count())
    }

    #[inline]
    fn clamp_priority(&self, priority: Priority) -> Priority {
        priority.min(self.config.max_priorities.saturating_sub(1))
    }

    // =========================================================================
    // PROCESSES
    // =========================================================================

    pub fn process_create(&self, name: Option<&str>, parent: Option<Pid>) -> OsalResult<Pid> {
        self.ctx()?.processes.create(name, parent)
    }

    /// Release a process record; its threads are left alone
    pub fn process_destroy(&self, pid: Pid) -> OsalResult<()> {
        let ctx = self.ctx()?;
        let references = ctx.threads.count(ThreadFilter::Process(pid));
        ctx.processes.destroy(pid, references);
        Ok(())
    }

    /// Mark `pid` terminated; its threads keep running
    pub fn process_kill(&self, pid: Pid, status: ExitStatus) -> OsalResult<()> {
        self.ctx()?.processes.kill(pid, status)
    }

    pub fn process_wait(&self, pid: Pid, timeout: Timeout) -> OsalResult<()> {
        let ctx = self.ctx()?;
        traced("process_wait", pid, || ctx.processes.wait(pid, timeout))
    }

    /// Process of the calling thread, or the root process for contexts
    /// that were never attached to one
    pub fn process_current(&self) -> OsalResult<Pid> {
        Ok(self.ctx()?.current_process())
    }

    /// Move the calling thread to `pid`
    pub fn process_set_current(&self, pid: Pid) -> OsalResult<()> {
        let ctx = self.ctx()?;
        ctx.processes.get(pid)?;
        ctx.current_thread()?.set_process(pid);
        Ok(())
    }

    pub fn process_state(&self, pid: Pid) -> OsalResult<ProcessState> {
        Ok(self.ctx()?.processes.get(pid)?.state())
    }

    pub fn process_name(&self, pid: Pid) -> OsalResult<SmartString> {
        Ok(self.ctx()?.processes.get(pid)?.name().as_str().into())
    }

    pub fn process_uid(&self, pid: Pid) -> OsalResult<Uid> {
        Ok(self.ctx()?.processes.get(pid)?.uid())
    }

    pub fn set_process_uid(&self, pid: Pid, uid: Uid) -> OsalResult<()> {
        self.ctx()?.processes.get(pid)?.set_uid(uid);
        Ok(())
    }

    pub fn process_pwd(&self, pid: Pid) -> OsalResult<SmartString> {
        Ok(self.ctx()?.processes.get(pid)?.pwd().as_str().into())
    }

    /// Set the working directory, truncating overlong paths
    pub fn set_process_pwd(&self, pid: Pid, pwd: &str) -> OsalResult<()> {
        if pwd.is_empty() {
            return Err(OsalError::invalid("working directory must not be empty"));
        }
        self.ctx()?.processes.get(pid)?.set_pwd(pwd);
        Ok(())
    }

    pub fn process_exit_status(&self, pid: Pid) -> OsalResult<Option<ExitStatus>> {
        Ok(self.ctx()?.processes.get(pid)?.exit_status())
    }

    pub fn process_parent(&self, pid: Pid) -> OsalResult<Option<Pid>> {
        Ok(self.ctx()?.processes.get(pid)?.parent())
    }

    pub fn process_info(&self, pid: Pid) -> OsalResult<ProcessInfo> {
        Ok(self.ctx()?.processes.get(pid)?.info())
    }

    /// Only the root process is resolvable
    pub fn find_process_by_name(&self, name: &str) -> OsalResult<Pid> {
        self.ctx()?.processes.find_by_name(name)
    }

    /// Only the root process is resolvable
    pub fn find_process_by_id(&self, pid: Pid) -> OsalResult<Pid> {
        self.ctx()?.processes.find_by_id(pid)
    }

    pub fn processes(&self) -> OsalResult<Vec<Pid>> {
        Ok(self.ctx()?.processes.pids())
    }

    // =========================================================================
    // SYNCHRONIZATION COLLABORATORS
    // =========================================================================

    /// Mutex whose ownership follows this coordinator's scheduler tasks
    pub fn mutex(&self, recursive: bool) -> OsalMutex {
        OsalMutex::new(Arc::clone(&self.scheduler), recursive)
    }

    pub fn semaphore(&self, initial: u32, max: u32) -> OsalResult<Semaphore> {
        Semaphore::new(initial, max)
    }

    pub fn queue<T>(&self, capacity: usize) -> OsalResult<BoundedQueue<T>> {
        BoundedQueue::new(capacity)
    }

    /// Dormant timer at the scheduler's tick resolution
    pub fn timer<F>(&self, period_ms: u32, auto_reload: bool, callback: F) -> OsalResult<SoftwareTimer>
    where
        F: FnMut() + Send + 'static,
    {
        SoftwareTimer::new(
            period_ms,
            auto_reload,
            self.scheduler.tick_rate_hz(),
            Box::new(callback),
        )
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("phase", &self.phase())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        if self.context.load().is_some() {
            if let Err(e) = self.deinit() {
                warn!(error = %e, "Deinit on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn coordinator() -> LifecycleCoordinator {
        LifecycleCoordinator::new(OsalConfig::default()).unwrap()
    }

    #[test]
    fn test_init_deinit_cycle() {
        let osal = coordinator();
        assert_eq!(osal.phase(), BootPhase::Uninitialized);
        assert_eq!(osal.thread_current(), Err(OsalError::NotInitialized));

        osal.init().unwrap();
        assert!(osal.is_initialized());
        osal.init().unwrap();

        osal.deinit().unwrap();
        assert!(!osal.is_initialized());
        osal.deinit().unwrap();

        osal.init().unwrap();
        assert!(osal.is_initialized());
    }

    #[test]
    fn test_bootstrap_adopts_caller_into_root() {
        let osal = coordinator();
        osal.init().unwrap();
        let root = osal.find_process_by_name("system").unwrap();
        assert_eq!(osal.process_state(root), Ok(ProcessState::Running));
        assert_eq!(osal.process_current(), Ok(root));
        assert_eq!(osal.thread_process(None), Ok(root));
        assert_eq!(osal.thread_count(ThreadFilter::All), Ok(1));
    }

    #[test]
    fn test_thread_inherits_caller_process() {
        let osal = coordinator();
        osal.init().unwrap();
        let pid = osal.process_create(Some("app"), None).unwrap();
        osal.process_set_current(pid).unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let id = osal
            .thread_create(ThreadConfig::new("child"), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        osal.thread_join(id).unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(osal.thread_process(Some(id)), Ok(pid));
        assert_eq!(osal.thread_module_name(Some(id)).unwrap().as_str(), "app");
    }

    #[test]
    fn test_unknown_process_rejected() {
        let osal = coordinator();
        osal.init().unwrap();
        let err = osal
            .thread_create(ThreadConfig::new("t").with_process(999), || {})
            .unwrap_err();
        assert!(matches!(err, OsalError::InvalidArgument(_)));
    }

    #[test]
    fn test_priority_clamped_to_levels() {
        let osal = coordinator();
        osal.init().unwrap();
        osal.set_thread_priority(None, 250).unwrap();
        assert_eq!(osal.thread_priority(None), Ok(31));
    }
}
