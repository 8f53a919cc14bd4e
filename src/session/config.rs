//! Buffer sizing and tracing configuration for a session.

use super::tracing_config::TracingConfig;
use crate::codec::clamp_buffer_length;

const DEFAULT_BUFFER_LENGTH: usize = 4096;

/// Session configuration.
///
/// Every buffer size is clamped between 64 bytes and 16 MiB.
///
/// # Examples
///
/// ```
/// use netconf_async::SessionConfig;
///
/// let config = SessionConfig::default().decode_buffer_capacity(1);
/// assert_eq!(config.decode_buffer_capacity_value(), 64);
/// assert_eq!(config.write_window_value(), 4096);
/// ```
#[derive(Clone, Debug)]
pub struct SessionConfig {
    send_buffer_capacity: usize,
    decode_buffer_capacity: usize,
    write_window: usize,
    read_chunk: usize,
    tracing: TracingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_buffer_capacity: DEFAULT_BUFFER_LENGTH,
            decode_buffer_capacity: DEFAULT_BUFFER_LENGTH,
            write_window: DEFAULT_BUFFER_LENGTH,
            read_chunk: DEFAULT_BUFFER_LENGTH,
            tracing: TracingConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Initial capacity of the reusable staging buffer for outgoing text.
    ///
    /// Requests larger than the buffer replace it with one that fits.
    #[must_use]
    pub fn send_buffer_capacity(mut self, capacity: usize) -> Self {
        self.send_buffer_capacity = clamp_buffer_length(capacity);
        self
    }

    /// Initial capacity of the decode buffer; it doubles whenever a message
    /// does not fit.
    #[must_use]
    pub fn decode_buffer_capacity(mut self, capacity: usize) -> Self {
        self.decode_buffer_capacity = clamp_buffer_length(capacity);
        self
    }

    /// Bytes handed to the channel per write call.
    #[must_use]
    pub fn write_window(mut self, size: usize) -> Self {
        self.write_window = clamp_buffer_length(size);
        self
    }

    /// Bytes requested from the stream per read call.
    #[must_use]
    pub fn read_chunk(mut self, size: usize) -> Self {
        self.read_chunk = clamp_buffer_length(size);
        self
    }

    /// Replace the tracing configuration.
    #[must_use]
    pub fn tracing_config(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    /// Configured staging buffer capacity.
    #[must_use]
    pub fn send_buffer_capacity_value(&self) -> usize { self.send_buffer_capacity }

    /// Configured initial decode buffer capacity.
    #[must_use]
    pub fn decode_buffer_capacity_value(&self) -> usize { self.decode_buffer_capacity }

    /// Configured write window.
    #[must_use]
    pub fn write_window_value(&self) -> usize { self.write_window }

    /// Configured read chunk size.
    #[must_use]
    pub fn read_chunk_value(&self) -> usize { self.read_chunk }

    /// Configured tracing behaviour.
    #[must_use]
    pub fn tracing(&self) -> &TracingConfig { &self.tracing }
}
