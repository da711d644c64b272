/*!
 * Lifecycle Context
 *
 * Everything one init/deinit cycle owns: both registries, the identity
 * slots and the resolver. Built by `init()`, dropped after `deinit()`.
 */

use crate::core::config::OsalConfig;
use crate::core::errors::OsalResult;
use crate::core::types::Pid;
use crate::process::ProcessRegistry;
use crate::scheduler::Scheduler;
use crate::thread::{IdentityResolver, IdentitySlots, ThreadRecord, ThreadRegistry};
use std::sync::Arc;

pub(crate) struct Context {
    pub threads: ThreadRegistry,
    pub processes: ProcessRegistry,
    pub resolver: IdentityResolver,
    pub root: Pid,
}

impl Context {
    /// Fresh registries with the root process in `Created`
    pub fn new(scheduler: Arc<dyn Scheduler>, config: &OsalConfig) -> Self {
        let slots = Arc::new(IdentitySlots::new());
        let threads = ThreadRegistry::new(Arc::clone(&scheduler), Arc::clone(&slots));
        let processes = ProcessRegistry::new(Arc::clone(&scheduler));
        let resolver = IdentityResolver::new(scheduler, slots);
        let root = processes.create_root(&config.root_process_name);
        Self {
            threads,
            processes,
            resolver,
            root,
        }
    }

    /// Record of the calling task, adopting it into the root process
    pub fn current_thread(&self) -> OsalResult<Arc<ThreadRecord>> {
        self.resolver
            .resolve_current(&self.threads, || self.root)
    }

    /// Process of the calling task without adopting it
    pub fn current_process(&self) -> Pid {
        self.resolver
            .peek_current()
            .map_or(self.root, |record| record.process())
    }
}
