//! Raw byte channel contract.
//!
//! A [`ByteChannel`] moves bytes for exactly one [`BufferProcessor`] at a
//! time per direction. It feeds buffers to the processor until the processor
//! reports [`Progress::Done`], then calls
//! [`completed`](BufferProcessor::completed); on any channel or codec fault it
//! calls [`failed`](BufferProcessor::failed) instead. Either way the processor
//! is consumed, so it finishes exactly once.
//!
//! For writes the channel hands the processor an empty buffer whose spare
//! capacity is the write window; whatever the processor appends is sent. For
//! reads the buffer holds received bytes; the processor consumes what belongs
//! to its message and leaves the rest, which the channel keeps for the next
//! read processor.

use bytes::BytesMut;

use crate::{codec::CodecError, error::TransferError};

mod stream;

pub use stream::StreamChannel;

/// Whether a processor needs more buffer rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Feed another buffer.
    More,
    /// The message is fully written or fully received.
    Done,
}

/// Incremental I/O work bound to one outstanding future.
pub trait BufferProcessor: Send {
    /// Handle one buffer round.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the bytes violate the framing. The channel
    /// then fails the processor.
    fn process(&mut self, buffer: &mut BytesMut) -> Result<Progress, CodecError>;

    /// The message was fully transferred.
    fn completed(self: Box<Self>);

    /// The transfer failed; `err` carries the cause.
    fn failed(self: Box<Self>, err: TransferError);
}

/// Asynchronous byte transport under a session.
///
/// Both calls return immediately; the processor runs in the background.
/// Callers guarantee at most one outstanding processor per direction.
pub trait ByteChannel: Send + Sync + 'static {
    /// Start writing the message held by `processor`.
    fn write(&self, processor: Box<dyn BufferProcessor>);

    /// Start reading one message into `processor`.
    fn read(&self, processor: Box<dyn BufferProcessor>);

    /// Stop all I/O; outstanding processors fail with
    /// [`TransferError::Closed`].
    fn shutdown(&self);
}
