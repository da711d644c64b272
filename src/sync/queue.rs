/*!
 * Bounded Queue
 * Fixed-capacity FIFO built on flume
 */

use crate::core::errors::{OsalError, OsalResult};
use crate::core::types::Timeout;
use flume::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use log::trace;

/// Fixed-capacity multi-producer multi-consumer queue
///
/// The queue owns both channel ends, so it can never observe a
/// disconnected peer while it is alive.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> OsalResult<Self> {
        if capacity == 0 {
            return Err(OsalError::invalid("queue capacity must be non-zero"));
        }
        let (tx, rx) = flume::bounded(capacity);
        Ok(Self { tx, rx, capacity })
    }

    /// Enqueue `item`, waiting for space according to `timeout`
    pub fn send(&self, item: T, timeout: Timeout) -> OsalResult<()> {
        match timeout {
            Timeout::NonBlocking => self.tx.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => OsalError::WouldBlock,
                TrySendError::Disconnected(_) => disconnected(),
            }),
            Timeout::After(duration) => self.tx.send_timeout(item, duration).map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    trace!("Queue send timed out after {:?}", duration);
                    OsalError::TimedOut {
                        timeout_ms: duration.as_millis() as u64,
                    }
                }
                SendTimeoutError::Disconnected(_) => disconnected(),
            }),
            Timeout::Forever => self.tx.send(item).map_err(|_| disconnected()),
        }
    }

    /// Dequeue the oldest item, waiting according to `timeout`
    pub fn receive(&self, timeout: Timeout) -> OsalResult<T> {
        match timeout {
            Timeout::NonBlocking => self.rx.try_recv().map_err(|e| match e {
                TryRecvError::Empty => OsalError::WouldBlock,
                TryRecvError::Disconnected => disconnected(),
            }),
            Timeout::After(duration) => self.rx.recv_timeout(duration).map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    trace!("Queue receive timed out after {:?}", duration);
                    OsalError::TimedOut {
                        timeout_ms: duration.as_millis() as u64,
                    }
                }
                RecvTimeoutError::Disconnected => disconnected(),
            }),
            Timeout::Forever => self.rx.recv().map_err(|_| disconnected()),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn disconnected() -> OsalError {
    OsalError::Internal("queue channel disconnected".into())
}
