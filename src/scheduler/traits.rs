/*!
 * Scheduler Traits
 * Interface consumed from the preemptive task scheduler
 */

use super::types::{Blocking, SchedulerResult, TaskBody, TaskHandle, TaskSpec, TaskStatus, TickCount};
use crate::core::types::Priority;
use smartstring::alias::String as SmartString;

/// Preemptive task scheduler with per-task wake tokens
///
/// The scheduler has no process concept and no join; it runs tasks to
/// completion and can delete them. Everything above that is built by the
/// lifecycle layer.
pub trait Scheduler: Send + Sync + 'static {
    /// Spawn a task running `body`
    fn spawn(&self, spec: TaskSpec, body: TaskBody) -> SchedulerResult<TaskHandle>;

    /// Force-delete a task; unknown or finished handles are ignored
    fn delete_task(&self, task: TaskHandle);

    /// Delete the calling task; never returns
    fn delete_current(&self) -> !;

    /// Handle of the calling execution context
    fn current_task(&self) -> TaskHandle;

    /// Block the calling task; `TickCount::MAX` blocks forever
    fn delay(&self, ticks: TickCount);

    /// Post the wake token of `task`
    fn notify_give(&self, task: TaskHandle);

    /// Take the calling task's wake token, clearing it; 0 means none arrived
    fn notify_take(&self, blocking: Blocking) -> u32;

    /// Ticks elapsed since the scheduler started
    fn tick_count(&self) -> TickCount;

    /// Tick frequency
    fn tick_rate_hz(&self) -> u32;

    /// Priority of a live task
    fn priority(&self, task: TaskHandle) -> Option<Priority>;

    /// Change the priority of a live task
    fn set_priority(&self, task: TaskHandle, priority: Priority) -> SchedulerResult<()>;

    /// Name of a live task
    fn task_name(&self, task: TaskHandle) -> Option<SmartString>;

    /// Status of one task
    fn task_status(&self, task: TaskHandle) -> Option<TaskStatus>;

    /// Status of every task the scheduler knows about
    fn snapshot(&self) -> Vec<TaskStatus>;
}
