//! Error types for the codec layer.
//!
//! Codec failures are fatal for the message being framed or unframed, but
//! never for the session: the processor that hit the error fails its own
//! future and the next queued item starts from a clean codec state.
//!
//! # Error Categories
//!
//! - [`FramingError`]: Wire-level violations of the chunked or end-of-message framing (malformed
//!   chunk headers, oversized chunks, buffers too small to carry framing overhead).
//! - [`EofError`]: The byte stream ended before a complete message was assembled.
//! - [`CodecError`]: Top-level enum wrapping both categories.

use std::io;

use thiserror::Error;

/// Framing-level errors occurring while applying or stripping the envelope.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A chunk header byte did not match the `\n#<size>\n` / `\n##\n` grammar.
    #[error("malformed chunk header: expected {expected}, found byte {found:#04x}")]
    MalformedChunkHeader {
        /// Description of the token the decoder was waiting for.
        expected: &'static str,
        /// The offending byte.
        found: u8,
    },

    /// A chunk header announced a size beyond the 32-bit limit.
    #[error("chunk size exceeds maximum of {max} bytes")]
    ChunkSizeTooLarge {
        /// Largest chunk size the framing permits.
        max: u32,
    },

    /// The destination buffer cannot hold even the framing overhead.
    #[error("destination buffer too small for framing overhead: {capacity} bytes")]
    BufferTooSmall {
        /// Capacity that was available.
        capacity: usize,
    },

    /// An unframed message grew beyond the configured limit.
    #[error("message exceeds max length: {size} > {max}")]
    OversizedMessage {
        /// Size reached when the limit tripped.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

/// End-of-stream conditions observed by a decoder.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The stream ended between messages.
    #[error("connection closed cleanly at message boundary")]
    CleanClose,

    /// The stream ended while a message was partially received.
    #[error("premature EOF: {bytes_buffered} bytes of an incomplete message buffered")]
    MidMessage {
        /// Bytes held by the decoder or its input buffer at EOF.
        bytes_buffered: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use netconf_async::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::ChunkSizeTooLarge { max: u32::MAX });
/// assert_eq!(err.error_type(), "framing");
/// assert!(!err.is_clean_close());
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns true if this error represents a clean close between messages.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"` or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
