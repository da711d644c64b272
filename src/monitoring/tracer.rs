/*!
 * Tracing
 * Subscriber setup and spans around blocking lifecycle operations
 *
 * Features:
 * - Trace IDs correlate the start and end of one join/wait
 * - JSON-formatted logs for structured parsing
 * - Duration and outcome recorded on every blocking operation
 */

use crate::core::errors::OsalResult;
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Returns `false` if a global subscriber was already installed, which
/// makes repeated calls from tests harmless.
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - OSAL_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("OSAL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span around one blocking operation (join, wait)
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
    trace_id: String,
}

impl OperationSpan {
    pub fn new(operation: &'static str, subject: impl Display) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "operation",
            trace_id = %trace_id,
            operation,
            subject = %subject,
            duration_us = tracing::field::Empty,
            outcome = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        span.in_scope(|| debug!(operation, trace_id = %trace_id, "operation started"));

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    /// Get the trace ID for this operation
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the outcome of the operation
    pub fn record_result<T>(&self, result: &OsalResult<T>) {
        match result {
            Ok(_) => {
                self.span.record("outcome", "success");
            }
            Err(e) => {
                self.span.record("outcome", "error");
                self.span.record("error", tracing::field::display(e));
            }
        }
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();
        debug!(
            trace_id = %self.trace_id,
            duration_us = duration.as_micros() as u64,
            "operation completed"
        );
    }
}

/// Run `f` inside an [`OperationSpan`], recording its result
#[inline]
pub fn traced<T>(
    operation: &'static str,
    subject: impl Display,
    f: impl FnOnce() -> OsalResult<T>,
) -> OsalResult<T> {
    let span = OperationSpan::new(operation, subject);
    let result = f();
    span.record_result(&result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::OsalError;

    #[test]
    fn test_trace_ids_unique() {
        assert_ne!(generate_trace_id(), generate_trace_id());
    }

    #[test]
    fn test_traced_passes_result_through() {
        assert_eq!(traced("join", 1, || Ok(5)), Ok(5));
        assert_eq!(
            traced::<()>("wait", 2, || Err(OsalError::WouldBlock)),
            Err(OsalError::WouldBlock)
        );
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        assert!(!init_tracing());
    }
}
