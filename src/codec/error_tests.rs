//! Unit tests for codec error types.

use std::io;

use rstest::rstest;

use super::{CodecError, EofError, FramingError};

#[test]
fn clean_eof_is_detectable() {
    let err = CodecError::Eof(EofError::CleanClose);
    assert!(err.is_clean_close());
    assert_eq!(err.error_type(), "eof");
}

#[test]
fn mid_message_eof_is_not_clean() {
    let err = CodecError::Eof(EofError::MidMessage { bytes_buffered: 12 });
    assert!(!err.is_clean_close());
}

#[rstest]
#[case(
    CodecError::Framing(FramingError::MalformedChunkHeader { expected: "'#'", found: b'x' }),
    io::ErrorKind::InvalidData
)]
#[case(
    CodecError::Framing(FramingError::ChunkSizeTooLarge { max: u32::MAX }),
    io::ErrorKind::InvalidData
)]
#[case(
    CodecError::Eof(EofError::MidMessage { bytes_buffered: 3 }),
    io::ErrorKind::UnexpectedEof
)]
fn codec_error_converts_to_io_error_with_correct_kind(
    #[case] err: CodecError,
    #[case] kind: io::ErrorKind,
) {
    let io_err: io::Error = err.into();
    assert_eq!(io_err.kind(), kind);
}

#[test]
fn malformed_header_message_names_offending_byte() {
    let err = FramingError::MalformedChunkHeader {
        expected: "'#'",
        found: b'x',
    };
    assert_eq!(
        err.to_string(),
        "malformed chunk header: expected '#', found byte 0x78"
    );
}
