//! Builder for configuring and starting a [`Session`].

use tokio::{
    io::{AsyncRead, AsyncWrite},
    runtime::Handle,
};

use super::{Session, SessionConfig, TracingConfig};
use crate::{channel::StreamChannel, error::InitializationError};

/// Builder for [`Session`].
///
/// # Examples
///
/// ```
/// use netconf_async::SessionBuilder;
///
/// # #[tokio::main]
/// # async fn main() {
/// let session = SessionBuilder::new()
///     .decode_buffer_capacity(64 * 1024)
///     .build()
///     .expect("inside a runtime");
/// assert_eq!(session.state(), netconf_async::SessionState::Detached);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    runtime: Option<Handle>,
}

impl SessionBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// See [`SessionConfig::send_buffer_capacity`].
    #[must_use]
    pub fn send_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.send_buffer_capacity(capacity);
        self
    }

    /// See [`SessionConfig::decode_buffer_capacity`].
    #[must_use]
    pub fn decode_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.decode_buffer_capacity(capacity);
        self
    }

    /// See [`SessionConfig::write_window`].
    #[must_use]
    pub fn write_window(mut self, size: usize) -> Self {
        self.config = self.config.write_window(size);
        self
    }

    /// See [`SessionConfig::read_chunk`].
    #[must_use]
    pub fn read_chunk(mut self, size: usize) -> Self {
        self.config = self.config.read_chunk(size);
        self
    }

    /// Configure tracing spans and timing for session operations.
    ///
    /// # Examples
    ///
    /// ```
    /// use netconf_async::{SessionBuilder, TracingConfig};
    /// use tracing::Level;
    ///
    /// let builder = SessionBuilder::new()
    ///     .tracing_config(TracingConfig::default().with_rpc_level(Level::INFO));
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn tracing_config(mut self, tracing: TracingConfig) -> Self {
        self.config = self.config.tracing_config(tracing);
        self
    }

    /// Run the session's work on `runtime` instead of the current one.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Create a detached session.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationError::NoRuntime`] when no runtime was given
    /// and the caller is not inside one.
    pub fn build(self) -> Result<Session, InitializationError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| InitializationError::NoRuntime)?,
        };
        Ok(Session::new(runtime, self.config))
    }

    /// Create a session and attach `stream` to it.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationError::NoRuntime`] when no runtime is
    /// available.
    pub fn connect<S>(self, stream: S) -> Result<Session, InitializationError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let write_window = self.config.write_window_value();
        let read_chunk = self.config.read_chunk_value();
        let session = self.build()?;
        let channel = StreamChannel::new(
            stream,
            session.inner.runtime.clone(),
            write_window,
            read_chunk,
        );
        session.attach(channel)?;
        Ok(session)
    }
}
