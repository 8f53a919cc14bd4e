#![cfg(not(loom))]
//! Integration tests for round trips over a duplex stream.
//!
//! A `MockServer` plays the device; the tests cover pairing, pipelining,
//! phase-specific timeouts and large or fragmented messages.

use std::time::Duration;

use netconf_async::{RpcError, SessionBuilder, TransferError, codec::CodecError};
use netconf_async_testing::{
    TestResult,
    rpc_expect,
    rpc_expect_err,
    rpc_reply,
    session_pair,
    session_pair_with,
};
use rstest::rstest;

const LONG: Duration = Duration::from_secs(5);
const SHORT: Duration = Duration::from_millis(50);

#[tokio::test]
async fn hundred_pipelined_rpcs_pair_in_order() -> TestResult {
    let (session, mut server) = session_pair()?;
    let replies: Vec<_> = (1..=100)
        .map(|id| session.rpc(format!("<rpc message-id=\"{id}\"><get/></rpc>"), LONG, LONG))
        .collect();

    let received = server
        .answer(100, |request| {
            let id = request
                .split('"')
                .nth(1)
                .expect("request carries a message-id")
                .to_owned();
            rpc_reply(id, "<data/>")
        })
        .await?;
    assert_eq!(received.len(), 100);

    for (id, reply) in (1..=100).zip(replies) {
        assert_eq!(rpc_expect!(reply), rpc_reply(id, "<data/>"));
    }
    Ok(())
}

#[tokio::test]
async fn request_timeout_is_distinct_from_response_timeout() -> TestResult {
    // Nobody drains the 64-byte duplex, so a 64 KiB request cannot finish.
    let (session, _server) = session_pair_with(SessionBuilder::new().write_window(64), 64)?;
    let payload = format!("<rpc>{}</rpc>", "x".repeat(64 * 1024));

    let err = rpc_expect_err!(session.rpc(payload, SHORT, LONG));
    assert!(matches!(err, RpcError::RequestTimeout(TransferError::Timeout(d)) if d == SHORT));
    assert!(err.is_timeout());
    assert_eq!(err.phase(), "request");
    Ok(())
}

#[tokio::test]
async fn response_timeout_reports_response_budget() -> TestResult {
    let (session, mut server) = session_pair()?;
    let reply = session.rpc("<rpc message-id=\"1\"/>", LONG, SHORT);
    server.recv().await?;

    let err = rpc_expect_err!(reply);
    assert!(matches!(err, RpcError::ResponseTimeout(TransferError::Timeout(d)) if d == SHORT));
    Ok(())
}

#[tokio::test]
async fn late_reply_to_timed_out_rpc_is_not_delivered_to_next() -> TestResult {
    let (session, mut server) = session_pair()?;
    let first = session.rpc("<rpc message-id=\"1\"/>", LONG, SHORT);
    server.recv().await?;
    assert!(rpc_expect_err!(first).is_timeout());

    // The first reply slot is still reserved, so its late reply is consumed
    // there rather than handed to the second caller.
    let second = session.rpc("<rpc message-id=\"2\"/>", LONG, LONG);
    server.recv().await?;
    server.send(&rpc_reply(1, "<late/>")).await?;
    server.send(&rpc_reply(2, "<ok/>")).await?;

    let reply = rpc_expect!(second);
    assert_eq!(reply, rpc_reply(2, "<ok/>"));
    Ok(())
}

#[rstest]
#[case::end_of_message(false)]
#[case::chunked(true)]
#[tokio::test]
async fn megabyte_reply_grows_decode_buffer(#[case] chunked: bool) -> TestResult {
    let (session, mut server) =
        session_pair_with(SessionBuilder::new().decode_buffer_capacity(64), 4096)?;
    if chunked {
        let hello = session.hello(
            "<hello><capability>urn:ietf:params:netconf:base:1.1</capability></hello>",
            netconf_async_testing::parse_capabilities,
            LONG,
            LONG,
        );
        server
            .exchange_hello(&[netconf_async::capabilities::BASE_1_1])
            .await?;
        rpc_expect!(hello);
    }

    let body = "y".repeat(1_000_000);
    let reply = session.rpc("<rpc message-id=\"1\"><get/></rpc>", LONG, LONG);
    server.recv().await?;
    server.send(&rpc_reply(1, &body)).await?;

    let text = rpc_expect!(reply);
    assert_eq!(text.len(), rpc_reply(1, &body).len());
    assert!(text.contains(&body));
    Ok(())
}

#[tokio::test]
async fn reply_split_across_writes_is_reassembled() -> TestResult {
    let (session, mut server) = session_pair()?;
    let reply = session.rpc("<rpc/>", LONG, LONG);
    server.recv().await?;

    for piece in [&b"<rpc-reply><ok/></rpc"[..], b"-reply>]]>", b"]]>"] {
        server.send_raw(piece).await?;
        tokio::task::yield_now().await;
    }
    assert_eq!(rpc_expect!(reply), "<rpc-reply><ok/></rpc-reply>");
    Ok(())
}

#[tokio::test]
async fn two_replies_in_one_write_reach_two_callers() -> TestResult {
    let (session, mut server) = session_pair()?;
    let first = session.rpc("<rpc message-id=\"1\"/>", LONG, LONG);
    let second = session.rpc("<rpc message-id=\"2\"/>", LONG, LONG);
    server.recv().await?;
    server.recv().await?;

    server
        .send_raw(b"<rpc-reply message-id=\"1\"/>]]>]]><rpc-reply message-id=\"2\"/>]]>]]>")
        .await?;
    assert_eq!(rpc_expect!(first), "<rpc-reply message-id=\"1\"/>");
    assert_eq!(rpc_expect!(second), "<rpc-reply message-id=\"2\"/>");
    Ok(())
}

#[tokio::test]
async fn malformed_chunk_header_fails_response_phase() -> TestResult {
    let (session, mut server) = session_pair()?;
    let hello = session.hello(
        "<hello><capability>urn:ietf:params:netconf:base:1.1</capability></hello>",
        netconf_async_testing::parse_capabilities,
        LONG,
        LONG,
    );
    server
        .exchange_hello(&[netconf_async::capabilities::BASE_1_1])
        .await?;
    rpc_expect!(hello);

    let reply = session.rpc("<rpc/>", LONG, LONG);
    server.recv().await?;
    server.send_raw(b"\n#x\n").await?;

    let err = rpc_expect_err!(reply);
    assert!(
        matches!(err, RpcError::ResponsePhase(TransferError::Codec(CodecError::Framing(_)))),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn non_utf8_reply_is_an_encoding_failure() -> TestResult {
    let (session, mut server) = session_pair()?;
    let reply = session.rpc("<rpc/>", LONG, LONG);
    server.recv().await?;
    server.send_raw(b"<rpc-reply>\xff\xfe</rpc-reply>]]>]]>").await?;

    let err = rpc_expect_err!(reply);
    assert!(matches!(err, RpcError::ResponsePhase(TransferError::Encoding(_))));
    Ok(())
}

#[tokio::test]
async fn server_hangup_fails_pending_reply() -> TestResult {
    let (session, mut server) = session_pair()?;
    let reply = session.rpc("<rpc/>", LONG, LONG);
    server.recv().await?;
    server.send_raw(b"<rpc-reply>").await?;
    server.close();

    let err = rpc_expect_err!(reply);
    assert!(
        matches!(&err, RpcError::ResponsePhase(TransferError::Io(io)) if io.kind() == std::io::ErrorKind::UnexpectedEof),
        "unexpected error: {err:?}"
    );
    Ok(())
}
