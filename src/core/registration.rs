/*!
 * Waiter Registration Guard
 *
 * RAII release of a joiner/waiter slot. A blocked task can be force-deleted
 * while waiting; the host port unwinds it, and the guard makes sure the slot
 * it occupied does not stay claimed by a task that no longer exists.
 */

/// Runs `release` on drop unless [`Registration::disarm`] was called
#[must_use = "dropping the registration releases it immediately"]
pub struct Registration<F: FnMut()> {
    release: Option<F>,
}

impl<F: FnMut()> Registration<F> {
    #[inline]
    pub fn new(release: F) -> Self {
        Self {
            release: Some(release),
        }
    }

    /// The slot was already released under the record lock
    #[inline]
    pub fn disarm(mut self) {
        self.release = None;
    }
}

impl<F: FnMut()> Drop for Registration<F> {
    fn drop(&mut self) {
        if let Some(mut release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_release_on_drop() {
        let released = Cell::new(false);
        {
            let _reg = Registration::new(|| released.set(true));
        }
        assert!(released.get());
    }

    #[test]
    fn test_disarm_skips_release() {
        let released = Cell::new(false);
        let reg = Registration::new(|| released.set(true));
        reg.disarm();
        assert!(!released.get());
    }

    #[test]
    fn test_release_on_unwind() {
        let released = std::sync::atomic::AtomicBool::new(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _reg = Registration::new(|| {
                released.store(true, std::sync::atomic::Ordering::SeqCst)
            });
            std::panic::resume_unwind(Box::new("deleted"));
        }));
        assert!(result.is_err());
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }
}
