#![cfg(not(loom))]
//! Session lifecycle: attach, hello, framing upgrade and close.

use std::time::Duration;

use netconf_async::{
    InitializationError,
    MessageId,
    RpcError,
    Session,
    SessionState,
    StreamChannel,
    TransferError,
    capabilities::{BASE_1_0, BASE_1_1},
    codec::Framing,
};
use netconf_async_testing::{
    MockServer,
    TestResult,
    hello_message,
    parse_capabilities,
    rpc_expect,
    rpc_expect_err,
    rpc_reply,
    session_pair,
};
use rstest::rstest;
use tokio::{io::duplex, runtime::Handle};

const LONG: Duration = Duration::from_secs(5);

#[rstest]
#[case::both_support_chunked(&[BASE_1_0, BASE_1_1], Framing::Chunked)]
#[case::server_base_only(&[BASE_1_0], Framing::EndOfMessage)]
#[tokio::test]
async fn hello_settles_framing(
    #[case] server_caps: &'static [&'static str],
    #[case] expected: Framing,
) -> TestResult {
    let (session, mut server) = session_pair()?;
    assert_eq!(session.state(), SessionState::Attached);

    let caps = session.hello(hello_message(&[BASE_1_0, BASE_1_1]), parse_capabilities, LONG, LONG);
    let client_hello = server.exchange_hello(server_caps).await?;
    assert!(client_hello.contains(BASE_1_1));

    let caps = rpc_expect!(caps);
    assert_eq!(caps.len(), server_caps.len());
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.framing(), expected);
    assert_eq!(server.framing(), expected);

    let id = session.next_message_id();
    let reply = session.rpc(format!("<rpc message-id=\"{id}\"><get/></rpc>"), LONG, LONG);
    server.answer(1, |_| rpc_reply(id, "<data/>")).await?;
    assert_eq!(rpc_expect!(reply), rpc_reply(id, "<data/>"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rpc_before_attach_times_out_as_initialization() -> TestResult {
    let session = Session::builder().build()?;
    let err = rpc_expect_err!(session.rpc(
        "<hello/>",
        Duration::from_secs(1),
        Duration::from_secs(1)
    ));

    assert!(
        matches!(
            err,
            RpcError::Initialization(InitializationError::Timeout { elapsed })
                if elapsed >= Duration::from_secs(1)
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.phase(), "initialization");
    assert_eq!(session.state(), SessionState::Detached);
    Ok(())
}

#[tokio::test]
async fn work_submitted_before_attach_is_released() -> TestResult {
    let session = Session::builder().build()?;
    let hello = session.hello(hello_message(&[BASE_1_0]), parse_capabilities, LONG, LONG);

    let (client, server) = duplex(4096);
    session.attach(StreamChannel::new(client, Handle::current(), 4096, 4096))?;
    let mut server = MockServer::new(server);
    server.exchange_hello(&[BASE_1_0]).await?;

    assert!(!rpc_expect!(hello).supports_chunked_framing());
    assert_eq!(session.state(), SessionState::Active);
    Ok(())
}

#[tokio::test]
async fn close_session_terminates() -> TestResult {
    let (session, mut server) = session_pair()?;
    let closed = session.close(
        |buf: &mut String| {
            let id = MessageId::new(101);
            buf.push_str(&format!("<rpc message-id=\"{id}\"><close-session/></rpc>"));
            Ok::<_, std::io::Error>(id)
        },
        |reply: &str, id| {
            if reply.contains(&format!("message-id=\"{id}\"")) && reply.contains("<ok/>") {
                Ok(())
            } else {
                Err(std::io::Error::other("close-session refused"))
            }
        },
        LONG,
        LONG,
    );
    let request = server.recv().await?;
    assert!(request.contains("<close-session/>"));
    server.send(&rpc_reply(101, "<ok/>")).await?;

    rpc_expect!(closed);
    assert_eq!(session.state(), SessionState::Closed);

    let err = rpc_expect_err!(session.request("<rpc/>", LONG));
    assert!(matches!(err, RpcError::RequestPhase(TransferError::Closed)));
    Ok(())
}

#[tokio::test]
async fn refused_close_still_terminates() -> TestResult {
    let (session, mut server) = session_pair()?;
    let closed = session.close(
        |buf: &mut String| {
            buf.push_str("<rpc message-id=\"5\"><close-session/></rpc>");
            Ok::<_, std::io::Error>(MessageId::new(5))
        },
        |reply: &str, _| {
            if reply.contains("<rpc-error>") {
                Err(std::io::Error::other("close-session refused"))
            } else {
                Ok(())
            }
        },
        LONG,
        LONG,
    );
    server
        .answer(1, |_| rpc_reply(5, "<rpc-error><error-tag>in-use</error-tag></rpc-error>"))
        .await?;

    let err = rpc_expect_err!(closed);
    assert!(matches!(err, RpcError::ResponseConsumption(_)));
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn failed_negotiation_closes_session() -> TestResult {
    let (session, mut server) = session_pair()?;
    let hello = session.hello("<hello/>", parse_capabilities, LONG, LONG);
    server.recv().await?;
    server.send("<hello><capabilities/></hello>").await?;

    let err = rpc_expect_err!(hello);
    assert!(matches!(err, RpcError::ResponseConsumption(_)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.capabilities(), None);
    Ok(())
}
