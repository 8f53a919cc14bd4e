//! Generated checks for end-of-message framing.

use proptest::{prop_assert, prop_assert_eq, test_runner::TestCaseError};
use rstest::rstest;

use super::shared::{
    decode_fragments,
    deterministic_runner,
    encode_in_windows,
    fragment,
    fragment_sizes,
    marker_heavy_payload,
};
use crate::codec::{END_OF_MESSAGE, EndOfMessageCodec};

#[rstest]
#[case(64, 256)]
#[case(512, 96)]
fn decoding_is_insensitive_to_fragmentation(#[case] max_len: usize, #[case] cases: u32) {
    let mut runner = deterministic_runner(cases);
    let strategy = (marker_heavy_payload(max_len), fragment_sizes(), 1usize..32);

    runner
        .run(&strategy, |(payload, sizes, capacity)| {
            let mut wire = payload.clone();
            wire.extend_from_slice(END_OF_MESSAGE);
            wire.extend_from_slice(b"<next");

            let mut codec = EndOfMessageCodec::default();
            let (decoded, left) =
                decode_fragments(&mut codec, &fragment(&wire, &sizes), capacity)?
                    .ok_or_else(|| TestCaseError::fail("message never completed".to_owned()))?;

            prop_assert_eq!(decoded, payload);
            prop_assert_eq!(left, b"<next".len());
            Ok(())
        })
        .expect("end-of-message decoding should ignore fragment boundaries");
}

#[rstest]
#[case(1, 128)]
#[case(7, 128)]
fn encoding_is_insensitive_to_window_size(#[case] window: usize, #[case] cases: u32) {
    let mut runner = deterministic_runner(cases);

    runner
        .run(&marker_heavy_payload(256), |payload| {
            let mut codec = EndOfMessageCodec::default();
            let wire = encode_in_windows(&mut codec, &payload, window)?;

            prop_assert!(wire.ends_with(END_OF_MESSAGE));
            prop_assert_eq!(&wire[..wire.len() - END_OF_MESSAGE.len()], &payload[..]);
            Ok(())
        })
        .expect("end-of-message encoding should ignore window size");
}
