/*!
 * Scheduler Module
 * Task scheduler interface and the std-thread host port
 */

pub mod host;
pub mod ticks;
pub mod traits;
pub mod types;

// Re-export public API
pub use host::HostScheduler;
pub use ticks::{duration_to_ticks, ms_to_ticks, ticks_to_duration, ticks_to_ms};
pub use traits::Scheduler;
pub use types::{
    Blocking, SchedulerError, SchedulerResult, TaskBody, TaskDeleted, TaskHandle, TaskRunState,
    TaskSpec, TaskStatus, TickCount,
};
