//! Message framing codecs for the NETCONF wire formats.
//!
//! Two framings exist. Every session starts with the end-of-message framing,
//! which terminates each message with the `]]>]]>` marker, and may upgrade
//! once to the chunked framing (`\n#<size>\n` chunks closed by `\n##\n`) when
//! both peers advertise `base:1.1`. The upgrade never goes backwards.
//!
//! Codecs are incremental. [`MessageCodec::encode`] and
//! [`MessageCodec::decode`] are called repeatedly with successive buffer
//! fragments, never block, keep partial progress (a half-matched marker, a
//! split chunk header, the unread part of a chunk) in the codec instance, and
//! signal completion through their return value. Both calls only ever write
//! into the spare capacity of `dst`; the caller decides how to grow it.
//!
//! A codec instance carries the state of a single message in a single
//! direction. [`Framing::codec`] hands out fresh instances, one per queued
//! request or response.

use std::fmt;

use bytes::BytesMut;

mod chunked;
mod end_of_message;
pub mod error;
mod framed;

pub use chunked::{ChunkedCodec, END_OF_CHUNKS, MAX_CHUNK_SIZE};
pub use end_of_message::{END_OF_MESSAGE, EndOfMessageCodec};
pub use error::{CodecError, EofError, FramingError};
pub use framed::NetconfCodec;

/// Minimum buffer length in bytes.
///
/// Buffer sizes passed to configuration are clamped to at least this value so
/// a chunk header and the terminator always fit.
pub const MIN_BUFFER_LENGTH: usize = 64;

/// Maximum buffer length in bytes (16 MiB).
pub const MAX_BUFFER_LENGTH: usize = 16 * 1024 * 1024;

pub(crate) fn clamp_buffer_length(value: usize) -> usize {
    value.clamp(MIN_BUFFER_LENGTH, MAX_BUFFER_LENGTH)
}

/// Bytes that can still be written to `dst` without reallocating.
pub(crate) fn spare_capacity(dst: &BytesMut) -> usize { dst.capacity() - dst.len() }

/// Incremental framing strategy for one message in one direction.
pub trait MessageCodec: Send + fmt::Debug {
    /// Move as much of `src` as fits into the spare capacity of `dst`,
    /// applying this call's part of the framing envelope.
    ///
    /// Returns `true` once the message, including its terminator, has been
    /// fully written. Consumed bytes are advanced out of `src`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `dst` cannot hold the framing overhead.
    fn encode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError>;

    /// Consume framed bytes from `src`, appending de-framed payload to the
    /// spare capacity of `dst`.
    ///
    /// Returns `true` once a complete message has been assembled in `dst`.
    /// Bytes after the end of that message are left in `src`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the input violates the framing.
    fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError>;

    /// Discard any partial progress.
    fn reset(&mut self);
}

/// Wire framing negotiated for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Framing {
    /// `]]>]]>` terminated messages (`base:1.0`).
    #[default]
    EndOfMessage,
    /// Length-prefixed chunks (`base:1.1`).
    Chunked,
}

impl Framing {
    /// Create a fresh codec for this framing.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use netconf_async::codec::{Framing, MessageCodec};
    ///
    /// let mut codec = Framing::Chunked.codec();
    /// let mut src = BytesMut::from(&b"\n#5\nhello\n##\n"[..]);
    /// let mut dst = BytesMut::with_capacity(64);
    /// assert!(codec.decode(&mut src, &mut dst).expect("valid framing"));
    /// assert_eq!(&dst[..], b"hello");
    /// ```
    #[must_use]
    pub fn codec(self) -> Box<dyn MessageCodec> {
        match self {
            Self::EndOfMessage => Box::new(EndOfMessageCodec::default()),
            Self::Chunked => Box::new(ChunkedCodec::default()),
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndOfMessage => "end-of-message",
            Self::Chunked => "chunked",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
