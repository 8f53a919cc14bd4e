//! End-of-message framing (`base:1.0`).
//!
//! Messages are sent verbatim and terminated by [`END_OF_MESSAGE`]. The
//! decoder copies payload bytes through while tracking how much of the marker
//! the tail of the output currently matches, so a marker split across any
//! number of fragments is still recognised.

use bytes::{Buf, BytesMut};

use super::{CodecError, MessageCodec, spare_capacity};

/// Marker terminating every message.
pub const END_OF_MESSAGE: &[u8; 6] = b"]]>]]>";

/// Longest proper prefix of `END_OF_MESSAGE[..=i]` that is also a suffix.
const MARKER_FALLBACK: [usize; 6] = [0, 1, 0, 1, 2, 3];

fn advance_match(mut matched: usize, byte: u8) -> usize {
    while matched > 0 && END_OF_MESSAGE[matched] != byte {
        matched = MARKER_FALLBACK[matched - 1];
    }
    if END_OF_MESSAGE[matched] == byte {
        matched + 1
    } else {
        0
    }
}

/// Codec for `]]>]]>` terminated messages.
#[derive(Clone, Debug, Default)]
pub struct EndOfMessageCodec {
    /// Marker bytes already emitted by the encoder.
    marker_written: usize,
    /// Marker bytes the tail of the decoded output currently matches.
    matched: usize,
}

impl MessageCodec for EndOfMessageCodec {
    fn encode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError> {
        let payload = src.len().min(spare_capacity(dst));
        dst.extend_from_slice(&src[..payload]);
        src.advance(payload);
        if !src.is_empty() {
            return Ok(false);
        }

        let pending = &END_OF_MESSAGE[self.marker_written..];
        let marker = pending.len().min(spare_capacity(dst));
        dst.extend_from_slice(&pending[..marker]);
        self.marker_written += marker;
        if self.marker_written < END_OF_MESSAGE.len() {
            return Ok(false);
        }

        self.marker_written = 0;
        Ok(true)
    }

    fn decode(&mut self, src: &mut BytesMut, dst: &mut BytesMut) -> Result<bool, CodecError> {
        let limit = src.len().min(spare_capacity(dst));
        let mut end = limit;
        let mut complete = false;
        for (index, &byte) in src[..limit].iter().enumerate() {
            self.matched = advance_match(self.matched, byte);
            if self.matched == END_OF_MESSAGE.len() {
                end = index + 1;
                complete = true;
                break;
            }
        }

        dst.extend_from_slice(&src[..end]);
        src.advance(end);
        if complete {
            // The marker was copied through with the payload; drop it again.
            dst.truncate(dst.len().saturating_sub(END_OF_MESSAGE.len()));
            self.matched = 0;
        }
        Ok(complete)
    }

    fn reset(&mut self) {
        self.marker_written = 0;
        self.matched = 0;
    }
}
