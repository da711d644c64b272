/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::ThreadId;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use thiserror::Error;

/// Lifecycle layer errors with serialization support
///
/// `Busy`, `WouldBlock` and `TimedOut` are transient and may be retried.
/// `InvalidArgument` and `AlreadyJoined` are programming errors.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum OsalError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(osal::invalid_argument),
        help("Check the handle and parameters passed to the call.")
    )]
    InvalidArgument(SmartString),

    #[error("Allocation failure: {0}")]
    #[diagnostic(
        code(osal::allocation_failure),
        help("The scheduler ran out of task slots or memory. Destroy finished threads.")
    )]
    AllocationFailure(SmartString),

    #[error("Resource busy: {0}")]
    #[diagnostic(
        code(osal::busy),
        help("Another task is already waiting on this record. Retry later.")
    )]
    Busy(SmartString),

    #[error("Thread {0} already joined")]
    #[diagnostic(
        code(osal::already_joined),
        help("A thread can be joined exactly once.")
    )]
    AlreadyJoined(ThreadId),

    #[error("Operation would block")]
    #[diagnostic(code(osal::would_block))]
    WouldBlock,

    #[error("Timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(osal::timed_out),
        help("The resource did not become ready in time. Retry or extend the timeout.")
    )]
    TimedOut { timeout_ms: u64 },

    #[error("Counter overflow: {0}")]
    #[diagnostic(code(osal::overflow))]
    Overflow(SmartString),

    #[error("Not supported: {0}")]
    #[diagnostic(
        code(osal::unsupported),
        help("Only the root process can be looked up by name or id.")
    )]
    Unsupported(SmartString),

    #[error("Not owner: {0}")]
    #[diagnostic(
        code(osal::not_owner),
        help("Only the task holding a mutex may unlock it.")
    )]
    NotOwner(SmartString),

    #[error("Lifecycle layer is not initialized")]
    #[diagnostic(
        code(osal::not_initialized),
        help("Call LifecycleCoordinator::init() before any other operation.")
    )]
    NotInitialized,

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(osal::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(SmartString),
}

impl OsalError {
    /// Shorthand for [`OsalError::InvalidArgument`]
    pub fn invalid(msg: impl AsRef<str>) -> Self {
        OsalError::InvalidArgument(msg.as_ref().into())
    }

    /// Whether a caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OsalError::Busy(_) | OsalError::WouldBlock | OsalError::TimedOut { .. }
        )
    }

    /// Negative POSIX error code for C-compatible callers
    pub fn errno(&self) -> i32 {
        let errno = match self {
            OsalError::InvalidArgument(_) | OsalError::AlreadyJoined(_) => Errno::EINVAL,
            OsalError::AllocationFailure(_) => Errno::ENOMEM,
            OsalError::Busy(_) => Errno::EBUSY,
            OsalError::WouldBlock => Errno::EAGAIN,
            OsalError::TimedOut { .. } => Errno::ETIMEDOUT,
            OsalError::Overflow(_) => Errno::EOVERFLOW,
            OsalError::Unsupported(_) => Errno::ENOTSUP,
            OsalError::NotOwner(_) | OsalError::NotInitialized => Errno::EPERM,
            OsalError::Internal(_) => Errno::EIO,
        };
        -(errno as i32)
    }
}

/// Result type for lifecycle operations
pub type OsalResult<T> = std::result::Result<T, OsalError>;
