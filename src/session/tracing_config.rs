//! Tracing configuration for session operations.
//!
//! [`TracingConfig`] controls the level of the span each session operation
//! opens and whether an `elapsed_us` timing event is emitted when it ends.

use tracing::Level;

/// Controls tracing span levels and per-operation timing.
///
/// Lifecycle operations (`hello`, `close`) default to `INFO`; the
/// high-frequency ones (`request`, `response`, `rpc`) default to `DEBUG`.
/// Timing is off for every operation by default.
///
/// Spans are always created at the configured level. With no subscriber
/// installed this costs nothing.
///
/// # Examples
///
/// ```
/// use tracing::Level;
/// use netconf_async::TracingConfig;
///
/// let config = TracingConfig::default()
///     .with_rpc_timing(true)
///     .with_hello_level(Level::DEBUG);
/// let _ = config;
///
/// let verbose = TracingConfig::default()
///     .with_all_levels(Level::TRACE)
///     .with_all_timing(true);
/// let _ = verbose;
/// ```
#[expect(
    clippy::struct_excessive_bools,
    reason = "five independent on/off timing flags, one per operation"
)]
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) request_level: Level,
    pub(crate) response_level: Level,
    pub(crate) rpc_level: Level,
    pub(crate) hello_level: Level,
    pub(crate) close_level: Level,
    pub(crate) request_timing: bool,
    pub(crate) response_timing: bool,
    pub(crate) rpc_timing: bool,
    pub(crate) hello_timing: bool,
    pub(crate) close_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            request_level: Level::DEBUG,
            response_level: Level::DEBUG,
            rpc_level: Level::DEBUG,
            hello_level: Level::INFO,
            close_level: Level::INFO,
            request_timing: false,
            response_timing: false,
            rpc_timing: false,
            hello_timing: false,
            close_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the span level for one-way `request` submissions.
    #[must_use]
    pub fn with_request_level(mut self, level: Level) -> Self {
        self.request_level = level;
        self
    }

    /// Enable or disable timing for `request`.
    #[must_use]
    pub fn with_request_timing(mut self, enabled: bool) -> Self {
        self.request_timing = enabled;
        self
    }

    /// Set the span level for `response` and `receive`.
    #[must_use]
    pub fn with_response_level(mut self, level: Level) -> Self {
        self.response_level = level;
        self
    }

    /// Enable or disable timing for `response` and `receive`.
    #[must_use]
    pub fn with_response_timing(mut self, enabled: bool) -> Self {
        self.response_timing = enabled;
        self
    }

    /// Set the span level for `rpc` and `request_then_interpret`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tracing::Level;
    /// use netconf_async::TracingConfig;
    ///
    /// let config = TracingConfig::default().with_rpc_level(Level::TRACE);
    /// let _ = config;
    /// ```
    #[must_use]
    pub fn with_rpc_level(mut self, level: Level) -> Self {
        self.rpc_level = level;
        self
    }

    /// Enable or disable timing for `rpc` and `request_then_interpret`.
    ///
    /// When enabled, an event recording `elapsed_us` is emitted at `DEBUG`
    /// level once the round trip finishes, successfully or not.
    #[must_use]
    pub fn with_rpc_timing(mut self, enabled: bool) -> Self {
        self.rpc_timing = enabled;
        self
    }

    /// Set the span level for the `hello` exchange.
    #[must_use]
    pub fn with_hello_level(mut self, level: Level) -> Self {
        self.hello_level = level;
        self
    }

    /// Enable or disable timing for the `hello` exchange.
    #[must_use]
    pub fn with_hello_timing(mut self, enabled: bool) -> Self {
        self.hello_timing = enabled;
        self
    }

    /// Set the span level for `close`.
    #[must_use]
    pub fn with_close_level(mut self, level: Level) -> Self {
        self.close_level = level;
        self
    }

    /// Enable or disable timing for `close`.
    #[must_use]
    pub fn with_close_timing(mut self, enabled: bool) -> Self {
        self.close_timing = enabled;
        self
    }

    /// Set the span level for all operations at once.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.request_level = level;
        self.response_level = level;
        self.rpc_level = level;
        self.hello_level = level;
        self.close_level = level;
        self
    }

    /// Enable or disable timing for all operations at once.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.request_timing = enabled;
        self.response_timing = enabled;
        self.rpc_timing = enabled;
        self.hello_timing = enabled;
        self.close_timing = enabled;
        self
    }
}
