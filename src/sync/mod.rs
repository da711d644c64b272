/*!
 * Synchronization Primitives
 * Mutex, semaphore, bounded queue and software timer used alongside threads
 */

pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod timer;

pub use mutex::OsalMutex;
pub use queue::BoundedQueue;
pub use semaphore::Semaphore;
pub use timer::{SoftwareTimer, TimerCallback};
