//! Chunked framing (`base:1.1`).
//!
//! A message is a sequence of chunks, each announced by a `\n#<size>\n`
//! header carrying the decimal byte length of the chunk that follows, and is
//! closed by the `\n##\n` end-of-chunks token. Sizes are between 1 and
//! [`MAX_CHUNK_SIZE`] and carry no leading zeros.
//!
//! The decoder is a byte-level state machine for headers and a bulk copy for
//! chunk bodies. It never consumes past the end of the current chunk, so any
//! bytes that follow in the same buffer are left for the next header or for
//! the next message.

use std::fmt::Write as _;

use bytes::{Buf, BytesMut};

use super::{CodecError, FramingError, MessageCodec, spare_capacity};

/// Token terminating a chunked message.
pub const END_OF_CHUNKS: &[u8; 4] = b"\n##\n";

/// Largest chunk size the framing allows.
pub const MAX_CHUNK_SIZE: u32 = u32::MAX;

/// Length of `\n#<size>\n` for a size with `digits` decimal digits.
const fn header_len(digits: usize) -> usize { digits + 3 }

fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DecodeState {
    /// Awaiting the `\n` opening a chunk header or the end token.
    #[default]
    HeaderStart,
    /// Awaiting the `#` after the opening `\n`.
    HeaderHash,
    /// Awaiting the first size digit or the second `#` of the end token.
    SizeOrEnd,
    /// Accumulating size digits.
    Size(u32),
    /// Inside a chunk body with this many bytes left.
    Body(usize),
    /// Awaiting the `\n` closing the end token.
    EndNewline,
}

impl DecodeState {
    fn expectation(self) -> &'static str {
        match self {
            Self::HeaderStart | Self::EndNewline => "'\\n'",
            Self::HeaderHash => "'#'",
            Self::SizeOrEnd => "'#' or a digit 1-9",
            Self::Size(_) => "a digit or '\\n'",
            Self::Body(_) => "chunk data",
        }
    }
}

/// Codec for chunk-framed messages.
#[derive(Clone, Debug, Default)]
pub struct ChunkedCodec {
    state: DecodeState,
}

/// Header transition for one byte; `None` marks a completed end token.
fn next_header_state(state: DecodeState, byte: u8) -> Result<Option<DecodeState>, FramingError> {
    let next = match (state, byte) {
        (DecodeState::HeaderStart, b'\n') => DecodeState::HeaderHash,
        (DecodeState::HeaderHash, b'#') => DecodeState::SizeOrEnd,
        (DecodeState::SizeOrEnd, b'#') => DecodeState::EndNewline,
        (DecodeState::SizeOrEnd, b'1'..=b'9') => DecodeState::Size(u32::from(byte - b'0')),
        (DecodeState::Size(size), b'0'..=b'9') => size
            .checked_mul(10)
            .and_then(|size| size.checked_add(u32::from(byte - b'0')))
            .map(DecodeState::Size)
            .ok_or(FramingError::ChunkSizeTooLarge {
                max: MAX_CHUNK_SIZE,
            })?,
        (DecodeState::Size(size), b'\n') => {
            DecodeState::Body(usize::try_from(size).map_err(|_| {
                FramingError::ChunkSizeTooLarge {
                    max: MAX_CHUNK_SIZE,
                }
            })?)
        }
        (DecodeState::EndNewline, b'\n') => return Ok(None),
        (state, found) => {
            return Err(FramingError::MalformedChunkHeader {
                expected: state.expectation(),
                found,
            });
        }
    };
    Ok(Some(next))
}

impl ChunkedCodec {
    /// Advance the header state machine by one byte.
    ///
    /// Returns `Ok(true)` when the byte completed the end-of-chunks token.
    /// Any error leaves the codec ready for a fresh message.
    fn step_header(&mut self, byte: u8) -> Result<bool, CodecError> {
        match next_header_state(self.state, byte) {
            Ok(Some(state)) => {
                self.state = state;
                Ok(false)
            }
            Ok(None) => {
                self.state = DecodeState::HeaderStart;
                Ok(true)
            }
            Err(err) => {
                self.state = DecodeState::HeaderStart;
                Err(err.into())
            }
        }
    }
}

impl MessageCodec for ChunkedCodec {
    fn encode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError> {
        loop {
            let room = spare_capacity(dst);
            if src.is_empty() {
                if room >= END_OF_CHUNKS.len() {
                    dst.extend_from_slice(END_OF_CHUNKS);
                    return Ok(true);
                }
                return if dst.is_empty() {
                    Err(FramingError::BufferTooSmall { capacity: room }.into())
                } else {
                    Ok(false)
                };
            }

            let size = src
                .len()
                .min(room.saturating_sub(header_len(decimal_digits(room))))
                .min(MAX_CHUNK_SIZE as usize);
            if size == 0 {
                return if dst.is_empty() {
                    Err(FramingError::BufferTooSmall { capacity: room }.into())
                } else {
                    Ok(false)
                };
            }

            // Writing into a BytesMut cannot fail.
            let _ = write!(dst, "\n#{size}\n");
            dst.extend_from_slice(&src[..size]);
            src.advance(size);
        }
    }

    fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError> {
        loop {
            if let DecodeState::Body(remaining) = self.state {
                let take = remaining.min(src.len()).min(spare_capacity(dst));
                if take == 0 {
                    return Ok(false);
                }
                dst.extend_from_slice(&src[..take]);
                src.advance(take);
                self.state = if take == remaining {
                    DecodeState::HeaderStart
                } else {
                    DecodeState::Body(remaining - take)
                };
                continue;
            }

            let Some(&byte) = src.first() else {
                return Ok(false);
            };
            src.advance(1);
            if self.step_header(byte)? {
                return Ok(true);
            }
        }
    }

    fn reset(&mut self) { self.state = DecodeState::HeaderStart; }
}
