/*!
 * System Limits and Constants
 *
 * Centralized location for capacities, defaults and magic numbers.
 * Organized by domain for maintainability and discoverability.
 */

// =============================================================================
// TEXT CAPACITIES
// =============================================================================

/// Capacity of process and thread names, terminator included
pub const MAX_MODULE_NAME_LENGTH: usize = 32;

/// Capacity of a process working directory, terminator included
pub const MAX_PATH_LENGTH: usize = 256;

// =============================================================================
// PROCESS DEFAULTS
// =============================================================================

/// Name of the root process created by `init()`
pub const ROOT_PROCESS_NAME: &str = "system";

/// Working directory every new process starts in
pub const DEFAULT_PWD: &str = "/";

/// User id every new process starts with
pub const DEFAULT_UID: u32 = 0;

/// First pid handed out by a fresh registry
pub const FIRST_PID: u32 = 1;

// =============================================================================
// SCHEDULER DEFAULTS
// =============================================================================

/// Scheduler tick frequency (1ms ticks)
pub const DEFAULT_TICK_RATE_HZ: u32 = 1000;

/// Number of priority levels; valid priorities are `0..MAX_PRIORITIES`
pub const DEFAULT_MAX_PRIORITIES: u8 = 32;

/// Priority used when a thread is created without one
pub const DEFAULT_THREAD_PRIORITY: u8 = 1;

/// Declared stack budget used when a thread is created without one
pub const DEFAULT_STACK_SIZE: usize = 4096;

/// Maximum number of live tasks on the host port
pub const DEFAULT_MAX_TASKS: usize = 256;

/// Host threads need far more stack than an RTOS task declares
pub const MIN_HOST_STACK_BYTES: usize = 256 * 1024;

/// Size of one stack word
pub const STACK_WORD_BYTES: usize = std::mem::size_of::<usize>();

/// Tick value meaning "block forever"
pub const MAX_DELAY: u64 = u64::MAX;
