//! Span and timing helpers for session operations.
//!
//! Keeps dynamic level selection out of the operation bodies.

use std::time::Instant;

use tracing::{Level, Span};

use super::tracing_config::TracingConfig;

/// Create a tracing span at a dynamically selected level.
///
/// Each branch calls the matching `tracing::<level>_span!` macro so the span
/// metadata stays static per branch while the branch choice is dynamic.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

/// Span for a one-way request submission.
pub(crate) fn request_span(config: &TracingConfig, message_bytes: usize) -> Span {
    dynamic_span!(
        config.request_level,
        "session.request",
        message.bytes = message_bytes,
        result = tracing::field::Empty
    )
}

/// Span for `response` and `receive`.
///
/// `message.bytes` and `result` are recorded once the reply arrives.
pub(crate) fn response_span(config: &TracingConfig) -> Span {
    dynamic_span!(
        config.response_level,
        "session.response",
        message.bytes = tracing::field::Empty,
        result = tracing::field::Empty
    )
}

/// Span for a round trip.
pub(crate) fn rpc_span(config: &TracingConfig, message_id: Option<u64>) -> Span {
    dynamic_span!(
        config.rpc_level,
        "session.rpc",
        message_id = message_id,
        result = tracing::field::Empty
    )
}

/// Span for the hello exchange.
pub(crate) fn hello_span(config: &TracingConfig) -> Span {
    dynamic_span!(
        config.hello_level,
        "session.hello",
        framing = tracing::field::Empty,
        result = tracing::field::Empty
    )
}

/// Span for `close`.
pub(crate) fn close_span(config: &TracingConfig) -> Span {
    dynamic_span!(config.close_level, "session.close", result = tracing::field::Empty)
}

/// Start a timer if timing is enabled for the operation.
pub(crate) fn timing_start(enabled: bool) -> Option<Instant> { enabled.then(Instant::now) }

/// Record elapsed time if timing was enabled for this operation.
///
/// `start` is `None` when timing is disabled.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}

/// Record the outcome label on `span`.
pub(crate) fn record_result<T, E>(span: &Span, result: &Result<T, E>) {
    span.record("result", if result.is_ok() { "ok" } else { "err" });
}
