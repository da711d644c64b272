/*!
 * Task Mutex
 * Owner-tracked mutex with optional recursion, unlocked explicitly
 */

use crate::core::errors::{OsalError, OsalResult};
use crate::scheduler::{Scheduler, TaskHandle};
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MutexState {
    owner: Option<TaskHandle>,
    depth: u32,
}

/// Mutex owned by a scheduler task
///
/// Lock and unlock are separate calls, so ownership is tracked by task
/// handle instead of a guard. A recursive mutex counts nested locks by its
/// owner; a plain one rejects them.
pub struct OsalMutex {
    scheduler: Arc<dyn Scheduler>,
    recursive: bool,
    state: Mutex<MutexState>,
    released: Condvar,
}

impl OsalMutex {
    pub fn new(scheduler: Arc<dyn Scheduler>, recursive: bool) -> Self {
        Self {
            scheduler,
            recursive,
            state: Mutex::new(MutexState::default()),
            released: Condvar::new(),
        }
    }

    /// Block until the calling task owns the mutex
    ///
    /// Relocking a non-recursive mutex from its owner is `InvalidArgument`.
    pub fn lock(&self) -> OsalResult<()> {
        let me = self.scheduler.current_task();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    if !self.recursive {
                        return Err(OsalError::invalid(format!(
                            "{} already holds this non-recursive mutex",
                            me
                        )));
                    }
                    state.depth = state.depth.checked_add(1).ok_or_else(|| {
                        OsalError::Overflow("mutex recursion depth".into())
                    })?;
                    return Ok(());
                }
                Some(owner) => {
                    trace!("{} waiting on mutex held by {}", me, owner);
                    self.released.wait(&mut state);
                }
            }
        }
    }

    /// Release one level of ownership; `NotOwner` if the caller does not hold it
    pub fn unlock(&self) -> OsalResult<()> {
        let me = self.scheduler.current_task();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(OsalError::NotOwner(
                format!("{} does not hold this mutex", me).into(),
            ));
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn owner(&self) -> Option<TaskHandle> {
        self.state.lock().owner
    }
}

impl std::fmt::Debug for OsalMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OsalMutex")
            .field("recursive", &self.recursive)
            .field("owner", &state.owner)
            .field("depth", &state.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OsalConfig;
    use crate::scheduler::HostScheduler;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn scheduler() -> Arc<dyn Scheduler> {
        Arc::new(HostScheduler::new(&OsalConfig::default()))
    }

    #[test]
    fn test_recursive_relock() {
        let mutex = OsalMutex::new(scheduler(), true);
        mutex.lock().unwrap();
        mutex.lock().unwrap();
        mutex.unlock().unwrap();
        assert!(mutex.owner().is_some());
        mutex.unlock().unwrap();
        assert_eq!(mutex.owner(), None);
        assert!(matches!(mutex.unlock(), Err(OsalError::NotOwner(_))));
    }

    #[test]
    fn test_plain_relock_rejected() {
        let mutex = OsalMutex::new(scheduler(), false);
        mutex.lock().unwrap();
        assert!(matches!(mutex.lock(), Err(OsalError::InvalidArgument(_))));
        mutex.unlock().unwrap();
    }

    #[test]
    fn test_non_owner_unlock() {
        let mutex = Arc::new(OsalMutex::new(scheduler(), false));
        mutex.lock().unwrap();

        let other = Arc::clone(&mutex);
        let err = std::thread::spawn(move || other.unlock())
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, OsalError::NotOwner(_)));
        assert_eq!(err.errno(), -(nix::errno::Errno::EPERM as i32));
        mutex.unlock().unwrap();
    }

    #[test]
    fn test_unlock_wakes_contender() {
        let mutex = Arc::new(OsalMutex::new(scheduler(), false));
        mutex.lock().unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&acquired);
        let contender = Arc::clone(&mutex);
        let handle = std::thread::spawn(move || {
            contender.lock().unwrap();
            flag.store(true, Ordering::SeqCst);
            contender.unlock().unwrap();
        });

        std::thread::sleep(Duration::from_millis(30));
        assert!(!acquired.load(Ordering::SeqCst));
        mutex.unlock().unwrap();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
