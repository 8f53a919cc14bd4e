//! In-memory NETCONF server end for session tests.

use std::io;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use netconf_async::{
    Capabilities,
    InitializationError,
    Session,
    SessionBuilder,
    capabilities::BASE_1_1,
    codec::{Framing, NetconfCodec},
};
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio_util::codec::Framed;

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Server end of a duplex stream, speaking the session's framing.
#[derive(Debug)]
pub struct MockServer {
    framed: Framed<DuplexStream, NetconfCodec>,
}

/// Connect a default session to a fresh [`MockServer`].
///
/// # Errors
///
/// Returns [`InitializationError::NoRuntime`] outside a Tokio runtime.
pub fn session_pair() -> Result<(Session, MockServer), InitializationError> {
    session_pair_with(SessionBuilder::new(), DEFAULT_CAPACITY)
}

/// Connect a session built by `builder` over a duplex of `capacity` bytes.
///
/// # Errors
///
/// Returns [`InitializationError::NoRuntime`] outside a Tokio runtime.
pub fn session_pair_with(
    builder: SessionBuilder,
    capacity: usize,
) -> Result<(Session, MockServer), InitializationError> {
    let (client, server) = duplex(capacity);
    let session = builder.connect(client)?;
    Ok((session, MockServer::new(server)))
}

impl MockServer {
    /// Serve on `stream` with end-of-message framing.
    #[must_use]
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            framed: Framed::new(stream, NetconfCodec::default()),
        }
    }

    /// Framing currently used in both directions.
    #[must_use]
    pub fn framing(&self) -> Framing { self.framed.codec().framing() }

    /// Switch to chunked framing. Returns `false` if already chunked.
    pub fn upgrade(&mut self) -> bool { self.framed.codec_mut().upgrade() }

    /// Receive the next complete message from the client.
    ///
    /// # Errors
    ///
    /// Fails on framing violations and with
    /// [`io::ErrorKind::UnexpectedEof`] once the client has gone away.
    pub async fn recv(&mut self) -> io::Result<String> {
        let frame: BytesMut = self.framed.next().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "client closed the stream")
        })??;
        String::from_utf8(frame.to_vec())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Frame and send `text`.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub async fn send(&mut self, text: &str) -> io::Result<()> { self.framed.send(text).await }

    /// Write `bytes` unframed, for malformed or split input.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await
    }

    /// Receive the client hello, answer with `capabilities` and upgrade to
    /// chunked framing when both sides advertise `base:1.1`.
    ///
    /// Returns the client's hello.
    ///
    /// # Errors
    ///
    /// Propagates receive and send failures.
    pub async fn exchange_hello(&mut self, capabilities: &[&str]) -> io::Result<String> {
        let client_hello = self.recv().await?;
        self.send(&hello_message(capabilities)).await?;
        if client_hello.contains(BASE_1_1) && capabilities.contains(&BASE_1_1) {
            self.upgrade();
        }
        Ok(client_hello)
    }

    /// Receive `count` messages, answering each with `reply` before reading
    /// the next. Returns what was received.
    ///
    /// # Errors
    ///
    /// Propagates receive and send failures.
    pub async fn answer<F>(&mut self, count: usize, mut reply: F) -> io::Result<Vec<String>>
    where
        F: FnMut(&str) -> String,
    {
        let mut received = Vec::with_capacity(count);
        for _ in 0..count {
            let request = self.recv().await?;
            self.send(&reply(&request)).await?;
            received.push(request);
        }
        Ok(received)
    }

    /// Close the server end.
    pub fn close(self) { drop(self.framed); }
}

/// Build a `<hello>` advertising `capabilities`.
#[must_use]
pub fn hello_message(capabilities: &[&str]) -> String {
    let mut hello = String::from(
        "<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><capabilities>",
    );
    for uri in capabilities {
        hello.push_str("<capability>");
        hello.push_str(uri);
        hello.push_str("</capability>");
    }
    hello.push_str("</capabilities></hello>");
    hello
}

/// Extract every `<capability>` from a hello.
///
/// Usable directly as the negotiator passed to
/// [`Session::hello`](netconf_async::Session::hello).
///
/// # Errors
///
/// Fails when the message carries no capability at all.
pub fn parse_capabilities(hello: &str) -> io::Result<Capabilities> {
    let capabilities: Capabilities = hello
        .split("<capability>")
        .skip(1)
        .filter_map(|rest| rest.split_once("</capability>"))
        .map(|(uri, _)| uri.trim().to_owned())
        .collect();
    if capabilities.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "hello advertises no capabilities",
        ));
    }
    Ok(capabilities)
}

/// Build an `<rpc-reply>` for `message_id` wrapping `body`.
#[must_use]
pub fn rpc_reply(message_id: impl std::fmt::Display, body: &str) -> String {
    format!(
        "<rpc-reply xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\" \
         message-id=\"{message_id}\">{body}</rpc-reply>"
    )
}

#[cfg(test)]
mod tests {
    use netconf_async::capabilities::BASE_1_0;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[BASE_1_0], false)]
    #[case(&[BASE_1_0, BASE_1_1], true)]
    fn hello_round_trips_through_parser(#[case] uris: &[&str], #[case] chunked: bool) {
        let caps = parse_capabilities(&hello_message(uris)).expect("capabilities");
        assert_eq!(caps.len(), uris.len());
        assert_eq!(caps.supports_chunked_framing(), chunked);
    }

    #[test]
    fn empty_hello_is_rejected() {
        assert!(parse_capabilities("<hello/>").is_err());
    }
}
