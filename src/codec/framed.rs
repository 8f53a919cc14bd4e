//! `tokio_util` adapter over the incremental codecs.
//!
//! [`NetconfCodec`] lets a whole-message peer (a test server, a proxy) sit on
//! top of `Framed` while sharing the exact framing rules the session engine
//! uses. It starts in end-of-message framing and can be upgraded once.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{
    CodecError,
    EofError,
    Framing,
    FramingError,
    MAX_BUFFER_LENGTH,
    MessageCodec,
    clamp_buffer_length,
};

/// Worst-case envelope for a single-chunk message: `\n#4294967295\n` plus
/// `\n##\n`.
const ENCODE_OVERHEAD: usize = 17;

/// Whole-message codec for `tokio_util::codec::Framed`.
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use netconf_async::codec::NetconfCodec;
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = NetconfCodec::default();
/// let mut wire = BytesMut::new();
/// codec
///     .encode(Bytes::from_static(b"<hello/>"), &mut wire)
///     .expect("encode");
/// assert_eq!(&wire[..], b"<hello/>]]>]]>");
///
/// let message = codec.decode(&mut wire).expect("decode").expect("complete");
/// assert_eq!(&message[..], b"<hello/>");
/// ```
#[derive(Debug)]
pub struct NetconfCodec {
    framing: Framing,
    max_message_length: usize,
    decoder: Box<dyn MessageCodec>,
    assembled: BytesMut,
    /// Framing bytes consumed for the message currently being assembled.
    consumed: usize,
}

impl NetconfCodec {
    /// Construct a codec accepting messages up to `max_message_length` bytes.
    ///
    /// The limit is clamped to the supported buffer range.
    #[must_use]
    pub fn new(max_message_length: usize) -> Self {
        Self {
            framing: Framing::EndOfMessage,
            max_message_length: clamp_buffer_length(max_message_length),
            decoder: Framing::EndOfMessage.codec(),
            assembled: BytesMut::new(),
            consumed: 0,
        }
    }

    /// Framing currently applied in both directions.
    #[must_use]
    pub fn framing(&self) -> Framing { self.framing }

    /// Largest message payload this codec accepts.
    #[must_use]
    pub fn max_message_length(&self) -> usize { self.max_message_length }

    /// Switch to chunked framing.
    ///
    /// Returns `false` when the codec was already chunked. Must only be
    /// called between messages; any partially decoded message is dropped.
    pub fn upgrade(&mut self) -> bool {
        if self.framing == Framing::Chunked {
            return false;
        }
        self.framing = Framing::Chunked;
        self.decoder = Framing::Chunked.codec();
        self.assembled.clear();
        self.consumed = 0;
        true
    }

    fn discard_partial(&mut self) {
        self.decoder.reset();
        self.assembled.clear();
        self.consumed = 0;
    }
}

impl Default for NetconfCodec {
    fn default() -> Self { Self::new(MAX_BUFFER_LENGTH) }
}

impl Decoder for NetconfCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // De-framed output never exceeds the framed input.
        self.assembled.reserve(src.len());
        let before = src.len();
        let result = self.decoder.decode(src, &mut self.assembled);
        self.consumed += before - src.len();

        let done = match result {
            Ok(done) => done,
            Err(err) => {
                self.discard_partial();
                return Err(err.into());
            }
        };

        if self.assembled.len() > self.max_message_length {
            let size = self.assembled.len();
            self.discard_partial();
            return Err(CodecError::Framing(FramingError::OversizedMessage {
                size,
                max: self.max_message_length,
            })
            .into());
        }

        if !done {
            return Ok(None);
        }
        self.consumed = 0;
        Ok(Some(self.assembled.split()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.is_empty() && self.consumed == 0 {
            return Ok(None);
        }

        let bytes_buffered = self.consumed + src.len();
        tracing::debug!(
            bytes_buffered,
            framing = %self.framing,
            "stream ended inside a message"
        );
        self.discard_partial();
        src.clear();
        Err(CodecError::Eof(EofError::MidMessage { bytes_buffered }).into())
    }
}

impl Encoder<Bytes> for NetconfCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_message_length {
            return Err(CodecError::Framing(FramingError::OversizedMessage {
                size: item.len(),
                max: self.max_message_length,
            })
            .into());
        }

        let mut encoder = self.framing.codec();
        let mut src = BytesMut::from(&item[..]);
        loop {
            dst.reserve(src.len() + ENCODE_OVERHEAD);
            if encoder.encode(&mut src, dst)? {
                return Ok(());
            }
        }
    }
}

impl Encoder<&str> for NetconfCodec {
    type Error = io::Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<Bytes>::encode(self, Bytes::copy_from_slice(item.as_bytes()), dst)
    }
}
