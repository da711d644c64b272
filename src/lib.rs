/*!
 * OSAL Kernel Library
 * Thread and process lifecycle layer over a preemptive task scheduler
 */

pub mod core;
pub mod lifecycle;
pub mod monitoring;
pub mod process;
pub mod scheduler;
pub mod sync;
pub mod thread;

// Re-exports
pub use crate::core::{
    ExitStatus, FixedText, OsalConfig, OsalError, OsalResult, Pid, Priority, ThreadId, Timeout,
    Uid,
};
pub use lifecycle::{BootPhase, LifecycleCoordinator, LifecycleCoordinatorBuilder};
pub use monitoring::{init_tracing, OperationSpan};
pub use process::{ProcessInfo, ProcessState};
pub use scheduler::{HostScheduler, Scheduler, TaskHandle};
pub use sync::{BoundedQueue, OsalMutex, Semaphore, SoftwareTimer};
pub use thread::{ThreadConfig, ThreadFilter, ThreadInfo, ThreadRunState, ThreadState};
