//! Shared proptest helpers for codec property tests.

use bytes::BytesMut;
use proptest::{
    collection::vec,
    prelude::{Just, Strategy, any, prop_oneof},
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestCaseError, TestRng, TestRunner},
};

use crate::codec::{END_OF_MESSAGE, MessageCodec};

pub fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

/// Payload bytes biased towards the marker alphabet so partial markers and
/// overlapping prefixes show up often.
pub fn marker_heavy_payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    vec(
        prop_oneof![Just(b']'), Just(b'>'), Just(b'\n'), Just(b'#'), any::<u8>()],
        0..=max_len,
    )
    .prop_filter("payload must not contain the end-of-message marker", |bytes| {
        !bytes.windows(END_OF_MESSAGE.len()).any(|w| w == END_OF_MESSAGE)
    })
}

/// Fragment sizes used to cut the wire stream; zero-length cuts are allowed.
pub fn fragment_sizes() -> impl Strategy<Value = Vec<usize>> { vec(0usize..=16, 1..32) }

/// Split `wire` into fragments following `sizes`, cycling through them.
pub fn fragment(wire: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
    let mut fragments = Vec::new();
    let mut offset = 0;
    let mut cut = sizes.iter().cycle();
    while offset < wire.len() {
        let size = cut.next().copied().unwrap_or(1).max(1);
        let end = (offset + size).min(wire.len());
        fragments.push(wire[offset..end].to_vec());
        offset = end;
    }
    fragments
}

/// Encode `payload` through output windows of `window` bytes.
pub fn encode_in_windows(
    codec: &mut dyn MessageCodec,
    payload: &[u8],
    window: usize,
) -> Result<Vec<u8>, TestCaseError> {
    let mut src = BytesMut::from(payload);
    let mut wire = Vec::new();
    loop {
        let mut dst = BytesMut::with_capacity(window);
        let done = codec
            .encode(&mut src, &mut dst)
            .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
        if dst.len() > window {
            return Err(TestCaseError::fail("encoder overran its window".to_owned()));
        }
        wire.extend_from_slice(&dst);
        if done {
            return Ok(wire);
        }
    }
}

/// Decode fragments one by one, growing the destination only when full.
///
/// Returns the payload and the number of wire bytes left unconsumed.
pub fn decode_fragments(
    codec: &mut dyn MessageCodec,
    fragments: &[Vec<u8>],
    initial_capacity: usize,
) -> Result<Option<(Vec<u8>, usize)>, TestCaseError> {
    let mut dst = BytesMut::with_capacity(initial_capacity);
    for (index, fragment) in fragments.iter().enumerate() {
        let mut src = BytesMut::from(fragment.as_slice());
        loop {
            let done = codec
                .decode(&mut src, &mut dst)
                .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?;
            if done {
                let rest: usize = fragments[index + 1..].iter().map(Vec::len).sum();
                return Ok(Some((dst.to_vec(), src.len() + rest)));
            }
            if src.is_empty() {
                break;
            }
            dst.reserve(dst.capacity().max(1));
        }
    }
    Ok(None)
}
