//! Metric helpers for `netconf_async`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking sessions with an attached channel.
pub const SESSIONS_ACTIVE: &str = "netconf_sessions_active";
/// Name of the counter tracking fully transferred messages.
pub const MESSAGES_TOTAL: &str = "netconf_messages_total";
/// Name of the counter tracking failed round-trip phases.
pub const PHASE_FAILURES_TOTAL: &str = "netconf_phase_failures_total";

/// Direction of a transferred message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Replies and notifications received from the server.
    Inbound,
    /// Requests sent to the server.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a transferred message for the given direction.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a failed phase, labelled by phase and failure kind.
pub fn inc_phase_failures(phase: &'static str, kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(PHASE_FAILURES_TOTAL, "phase" => phase, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = (phase, kind);
}
