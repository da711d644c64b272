/*!
 * Software Timer
 *
 * One-shot or auto-reloading timer serviced by a dedicated thread. Every
 * start/stop/reset/period change bumps a generation counter; the service
 * thread only fires if the generation it armed is still current.
 */

use crate::core::errors::{OsalError, OsalResult};
use crate::scheduler::{ms_to_ticks, ticks_to_duration, ticks_to_ms, TickCount};
use log::{debug, error};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Timer expiry callback
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

#[derive(Debug)]
struct TimerState {
    period: TickCount,
    auto_reload: bool,
    active: bool,
    generation: u64,
    shutdown: bool,
}

#[derive(Debug)]
struct TimerShared {
    state: Mutex<TimerState>,
    changed: Condvar,
}

impl TimerShared {
    fn update(&self, f: impl FnOnce(&mut TimerState)) {
        let mut state = self.state.lock();
        f(&mut state);
        state.generation = state.generation.wrapping_add(1);
        self.changed.notify_all();
    }
}

pub struct SoftwareTimer {
    shared: Arc<TimerShared>,
    tick_rate_hz: u32,
    worker: Option<JoinHandle<()>>,
}

impl SoftwareTimer {
    /// Create a dormant timer; call [`SoftwareTimer::start`] to arm it
    pub fn new(
        period_ms: u32,
        auto_reload: bool,
        tick_rate_hz: u32,
        callback: TimerCallback,
    ) -> OsalResult<Self> {
        if period_ms == 0 {
            return Err(OsalError::invalid("timer period must be non-zero"));
        }
        let tick_rate_hz = tick_rate_hz.max(1);
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                period: ms_to_ticks(period_ms as u64, tick_rate_hz),
                auto_reload,
                active: false,
                generation: 0,
                shutdown: false,
            }),
            changed: Condvar::new(),
        });

        let service = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("osal-timer".into())
            .spawn(move || service_timer(service, callback, tick_rate_hz))
            .map_err(|e| OsalError::AllocationFailure(format!("timer thread: {}", e).into()))?;

        Ok(Self {
            shared,
            tick_rate_hz,
            worker: Some(worker),
        })
    }

    pub fn start(&self) {
        self.shared.update(|state| state.active = true);
    }

    pub fn stop(&self) {
        self.shared.update(|state| state.active = false);
    }

    /// Restart the period from now
    pub fn reset(&self) {
        self.start();
    }

    /// Change the period; a dormant timer is started as well
    pub fn set_period(&self, period_ms: u32) -> OsalResult<()> {
        if period_ms == 0 {
            return Err(OsalError::invalid("timer period must be non-zero"));
        }
        let period = ms_to_ticks(period_ms as u64, self.tick_rate_hz);
        self.shared.update(|state| {
            state.period = period;
            state.active = true;
        });
        Ok(())
    }

    /// Period in milliseconds at tick resolution
    pub fn period_ms(&self) -> u64 {
        ticks_to_ms(self.shared.state.lock().period, self.tick_rate_hz)
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    pub fn is_auto_reload(&self) -> bool {
        self.shared.state.lock().auto_reload
    }
}

impl Drop for SoftwareTimer {
    fn drop(&mut self) {
        self.shared.update(|state| {
            state.active = false;
            state.shutdown = true;
        });
        if let Some(worker) = self.worker.take() {
            // Dropped from its own callback: the thread exits after returning
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                error!("Timer service thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for SoftwareTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareTimer")
            .field("period_ms", &self.period_ms())
            .field("active", &self.is_active())
            .finish()
    }
}

fn service_timer(shared: Arc<TimerShared>, mut callback: TimerCallback, tick_rate_hz: u32) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            debug!("Timer service stopped");
            return;
        }
        if !state.active {
            shared.changed.wait(&mut state);
            continue;
        }

        if !wait_expiry(&shared, &mut state, tick_rate_hz) {
            continue;
        }

        if !state.auto_reload {
            state.active = false;
        }
        MutexGuard::unlocked(&mut state, || {
            if panic::catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
                error!("Timer callback panicked");
            }
        });
    }
}

/// Block for one period; `false` if the timer was changed meanwhile
fn wait_expiry(shared: &TimerShared, state: &mut MutexGuard<'_, TimerState>, tick_rate_hz: u32) -> bool {
    let generation = state.generation;
    let deadline = ticks_to_duration(state.period, tick_rate_hz)
        .and_then(|period| Instant::now().checked_add(period));

    loop {
        if state.shutdown || state.generation != generation {
            return false;
        }
        match deadline {
            Some(deadline) => {
                if shared.changed.wait_until(state, deadline).timed_out() {
                    return state.generation == generation && !state.shutdown;
                }
            }
            None => shared.changed.wait(state),
        }
    }
}
