/*!
 * Counting Semaphore
 * Bounded counter with blocking acquire
 */

use crate::core::errors::{OsalError, OsalResult};
use crate::core::types::Timeout;
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Counting semaphore with a fixed maximum
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<u32>,
    max: u32,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `initial` of `max` units
    pub fn new(initial: u32, max: u32) -> OsalResult<Self> {
        if max == 0 {
            return Err(OsalError::invalid("semaphore max must be non-zero"));
        }
        if initial > max {
            return Err(OsalError::invalid(format!(
                "semaphore initial count {} exceeds max {}",
                initial, max
            )));
        }
        Ok(Self {
            count: Mutex::new(initial),
            max,
            available: Condvar::new(),
        })
    }

    /// Take one unit
    pub fn wait(&self, timeout: Timeout) -> OsalResult<()> {
        let mut count = self.count.lock();
        match timeout {
            Timeout::NonBlocking => {
                if *count == 0 {
                    return Err(OsalError::WouldBlock);
                }
            }
            Timeout::After(duration) => {
                let Some(deadline) = Instant::now().checked_add(duration) else {
                    drop(count);
                    return self.wait(Timeout::Forever);
                };
                while *count == 0 {
                    if self.available.wait_until(&mut count, deadline).timed_out() && *count == 0 {
                        trace!("Semaphore wait timed out after {:?}", duration);
                        return Err(OsalError::TimedOut {
                            timeout_ms: duration.as_millis() as u64,
                        });
                    }
                }
            }
            Timeout::Forever => {
                while *count == 0 {
                    self.available.wait(&mut count);
                }
            }
        }
        *count -= 1;
        Ok(())
    }

    /// Return one unit
    pub fn post(&self) -> OsalResult<()> {
        let mut count = self.count.lock();
        if *count >= self.max {
            return Err(OsalError::Overflow(
                format!("semaphore already at max {}", self.max).into(),
            ));
        }
        *count += 1;
        self.available.notify_one();
        Ok(())
    }

    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(Semaphore::new(0, 0), Err(OsalError::InvalidArgument(_))));
        assert!(matches!(Semaphore::new(3, 2), Err(OsalError::InvalidArgument(_))));
    }

    #[test]
    fn test_wait_and_post() {
        let sem = Semaphore::new(1, 2).unwrap();
        sem.wait(Timeout::NonBlocking).unwrap();
        assert_eq!(sem.wait(Timeout::NonBlocking), Err(OsalError::WouldBlock));
        sem.post().unwrap();
        sem.post().unwrap();
        assert!(matches!(sem.post(), Err(OsalError::Overflow(_))));
        assert_eq!(sem.count(), 2);
    }

    #[test]
    fn test_timed_wait() {
        let sem = Semaphore::new(0, 1).unwrap();
        let err = sem.wait(Timeout::After(Duration::from_millis(10))).unwrap_err();
        assert_eq!(err, OsalError::TimedOut { timeout_ms: 10 });
    }

    #[test]
    fn test_post_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(0, 1).unwrap());
        let poster = Arc::clone(&sem);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            poster.post().unwrap();
        });
        sem.wait(Timeout::Forever).unwrap();
        handle.join().unwrap();
        assert_eq!(sem.count(), 0);
    }
}
