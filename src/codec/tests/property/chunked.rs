//! Generated checks for chunked framing.

use bytes::BytesMut;
use proptest::{collection::vec, prelude::any, prop_assert_eq, test_runner::TestCaseError};
use rstest::rstest;

use super::shared::{
    decode_fragments,
    deterministic_runner,
    encode_in_windows,
    fragment,
    fragment_sizes,
};
use crate::codec::{ChunkedCodec, MessageCodec};

#[rstest]
#[case(96)]
fn round_trip_is_insensitive_to_windows_and_fragments(#[case] cases: u32) {
    let mut runner = deterministic_runner(cases);
    let strategy = (
        vec(any::<u8>(), 0..=600),
        8usize..=96,
        fragment_sizes(),
        1usize..64,
    );

    runner
        .run(&strategy, |(payload, window, sizes, capacity)| {
            let mut encoder = ChunkedCodec::default();
            let mut wire = encode_in_windows(&mut encoder, &payload, window)?;
            let message_len = wire.len();
            wire.extend_from_slice(b"\n#1\nz");

            let mut decoder = ChunkedCodec::default();
            let (decoded, left) =
                decode_fragments(&mut decoder, &fragment(&wire, &sizes), capacity)?
                    .ok_or_else(|| TestCaseError::fail("message never completed".to_owned()))?;

            prop_assert_eq!(decoded, payload);
            prop_assert_eq!(left, wire.len() - message_len);
            Ok(())
        })
        .expect("chunked framing should ignore window and fragment boundaries");
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4095)]
#[case(4096)]
#[case(4097)]
#[case(1_000_000)]
fn boundary_lengths_round_trip_through_default_buffers(#[case] len: usize) {
    const BUFFER: usize = 4096;

    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let mut encoder = ChunkedCodec::default();
    let mut src = BytesMut::from(payload.as_slice());
    let mut wire = Vec::new();
    loop {
        let mut window = BytesMut::with_capacity(BUFFER);
        let done = encoder.encode(&mut src, &mut window).expect("encode");
        assert!(window.len() <= window.capacity());
        wire.extend_from_slice(&window);
        if done {
            break;
        }
    }

    let mut decoder = ChunkedCodec::default();
    let mut dst = BytesMut::with_capacity(BUFFER);
    let mut completed = false;
    for read in wire.chunks(BUFFER) {
        let mut src = BytesMut::from(read);
        loop {
            if decoder.decode(&mut src, &mut dst).expect("decode") {
                completed = true;
                break;
            }
            if src.is_empty() {
                break;
            }
            dst.reserve(dst.capacity());
        }
    }

    assert!(completed, "terminator never observed");
    assert_eq!(dst.len(), len);
    assert_eq!(&dst[..], payload.as_slice());
}
