//! Round-trip orchestration.
//!
//! Each operation submits its transfers before returning, so call order is
//! wire order, and then hands the waiting to a task on the session runtime.
//! The request phase and the response phase are timed separately and their
//! failures are reported as distinct [`RpcError`] variants.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::Instrument;

use super::{
    Session,
    SessionInner,
    processor::{QueuedRequest, QueuedResponse, Submission},
    tracing_helpers::{
        close_span,
        emit_timing_event,
        hello_span,
        record_result,
        request_span,
        response_span,
        rpc_span,
        timing_start,
    },
};
use crate::{
    capabilities::Capabilities,
    completion::Pending,
    correlation::MessageId,
    error::{BoxError, RpcError},
    metrics,
};

/// Future resolving to the outcome of a session operation.
///
/// The operation runs on the session runtime whether or not this future is
/// polled; dropping it only discards the outcome.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct RpcFuture<T> {
    inner: RpcFutureInner<T>,
}

#[derive(Debug)]
enum RpcFutureInner<T> {
    Ready(Option<Result<T, RpcError>>),
    Spawned(JoinHandle<Result<T, RpcError>>),
}

// The outcome is only ever moved out, never pinned.
impl<T> Unpin for RpcFuture<T> {}

impl<T> RpcFuture<T> {
    fn ready(result: Result<T, RpcError>) -> Self {
        Self {
            inner: RpcFutureInner::Ready(Some(result)),
        }
    }

    fn spawned(handle: JoinHandle<Result<T, RpcError>>) -> Self {
        Self {
            inner: RpcFutureInner::Spawned(handle),
        }
    }
}

impl<T> Future for RpcFuture<T> {
    type Output = Result<T, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            RpcFutureInner::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(RpcError::Aborted)))
            }
            RpcFutureInner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|err| {
                    tracing::error!(error = %err, "session task did not complete");
                    Err(RpcError::Aborted)
                })
            }),
        }
    }
}

fn record_failure<T>(result: &Result<T, RpcError>) {
    if let Err(err) = result {
        let kind = if err.is_timeout() { "timeout" } else { "failure" };
        metrics::inc_phase_failures(err.phase(), kind);
    }
}

/// Await the two phases of a round trip.
async fn exchange(request: Pending<()>, response: Pending<String>) -> Result<String, RpcError> {
    request.await.map_err(RpcError::request)?;
    response.await.map_err(RpcError::response)
}

impl Session {
    /// Queue a round trip, in call order, and return its two phases.
    fn submit_round_trip(
        &self,
        text: String,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> (Pending<()>, Pending<String>) {
        let (request, sent, reply) =
            QueuedRequest::round_trip(text, request_timeout, response_timeout);
        self.inner.bridge.submit(Submission::Write(request));
        (sent, reply)
    }

    fn spawn<T, F>(&self, future: F) -> RpcFuture<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, RpcError>> + Send + 'static,
    {
        RpcFuture::spawned(self.inner.runtime.spawn(future))
    }

    /// Send `text` without waiting for a reply.
    ///
    /// Resolves once the framed message has been written. Pair it with
    /// [`response`](Self::response) when the reply is read separately.
    pub fn request(&self, text: impl Into<String>, timeout: Duration) -> RpcFuture<()> {
        let text = text.into();
        let span = request_span(self.inner.config.tracing(), text.len());
        let timing = timing_start(self.inner.config.tracing().request_timing);

        let (request, sent) = QueuedRequest::one_way(text, timeout);
        self.inner.bridge.submit(Submission::Write(request));

        self.spawn(
            async move {
                let result = sent.await.map_err(RpcError::request);
                record_failure(&result);
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }

    /// Read the next message from the server.
    pub fn response(&self, timeout: Duration) -> RpcFuture<String> {
        self.receive(|text: &str| Ok::<_, BoxError>(text.to_owned()), timeout)
    }

    /// Read the next message and hand it to `interpret`.
    ///
    /// Used for replies to requests sent with [`request`](Self::request) and
    /// for notifications.
    pub fn receive<T, E, I>(&self, interpret: I, timeout: Duration) -> RpcFuture<T>
    where
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        I: FnOnce(&str) -> Result<T, E> + Send + 'static,
    {
        let span = response_span(self.inner.config.tracing());
        let timing = timing_start(self.inner.config.tracing().response_timing);
        let (response, reply) = QueuedResponse::new(timeout);
        self.inner.bridge.submit(Submission::Read(response));

        self.spawn(
            async move {
                let result = match reply.await.map_err(RpcError::response) {
                    Ok(text) => {
                        tracing::Span::current().record("message.bytes", text.len());
                        interpret(&text).map_err(|err| RpcError::ResponseConsumption(err.into()))
                    }
                    Err(err) => Err(err),
                };
                record_failure(&result);
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }

    /// Send `text` and return the raw reply.
    ///
    /// If no channel is attached yet, the call waits for one within
    /// `request_timeout` and fails with
    /// [`RpcError::Initialization`] when none arrives.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use netconf_async::Session;
    ///
    /// # async fn example(session: Session) -> Result<(), netconf_async::RpcError> {
    /// let reply = session
    ///     .rpc("<rpc message-id=\"7\"><get/></rpc>", Duration::from_secs(5), Duration::from_secs(30))
    ///     .await?;
    /// println!("{reply}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn rpc(
        &self,
        text: impl Into<String>,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> RpcFuture<String> {
        let span = rpc_span(self.inner.config.tracing(), None);
        let timing = timing_start(self.inner.config.tracing().rpc_timing);
        let (sent, reply) = self.submit_round_trip(text.into(), request_timeout, response_timeout);

        self.spawn(
            async move {
                let result = exchange(sent, reply).await;
                record_failure(&result);
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }

    /// Build a request, run the round trip and interpret the reply.
    ///
    /// `build` writes the request into the supplied buffer and returns the
    /// message id it used; `interpret` receives the reply text with that id.
    /// A `build` failure resolves immediately with
    /// [`RpcError::RequestGeneration`] and nothing is queued.
    pub fn request_then_interpret<T, E, B, I>(
        &self,
        build: B,
        interpret: I,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> RpcFuture<T>
    where
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        B: FnOnce(&mut String) -> Result<MessageId, E>,
        I: FnOnce(&str, MessageId) -> Result<T, E> + Send + 'static,
    {
        let mut text = String::new();
        let message_id = match build(&mut text) {
            Ok(id) => id,
            Err(err) => {
                let result = Err(RpcError::RequestGeneration(err.into()));
                record_failure(&result);
                return RpcFuture::ready(result);
            }
        };

        let span = rpc_span(self.inner.config.tracing(), Some(message_id.get()));
        let timing = timing_start(self.inner.config.tracing().rpc_timing);
        let (sent, reply) = self.submit_round_trip(text, request_timeout, response_timeout);

        self.spawn(
            async move {
                let result = match exchange(sent, reply).await {
                    Ok(reply) => interpret(&reply, message_id)
                        .map_err(|err| RpcError::ResponseConsumption(err.into())),
                    Err(err) => Err(err),
                };
                record_failure(&result);
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }

    /// Exchange hellos and settle the framing.
    ///
    /// Sends `hello` with end-of-message framing and passes the server's
    /// hello to `negotiate`. If the negotiated set contains `base:1.1`, every
    /// transfer dispatched afterwards uses chunked framing. A negotiation
    /// failure terminates the session.
    pub fn hello<E, N>(
        &self,
        hello: impl Into<String>,
        negotiate: N,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> RpcFuture<Capabilities>
    where
        E: Into<BoxError> + Send + 'static,
        N: FnOnce(&str) -> Result<Capabilities, E> + Send + 'static,
    {
        let span = hello_span(self.inner.config.tracing());
        let timing = timing_start(self.inner.config.tracing().hello_timing);
        let (sent, reply) = self.submit_round_trip(hello.into(), request_timeout, response_timeout);
        let inner = Arc::clone(&self.inner);

        self.spawn(
            async move {
                let result = match exchange(sent, reply).await {
                    Ok(reply) => settle_hello(&inner, &reply, negotiate),
                    Err(err) => Err(err),
                };
                record_failure(&result);
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }

    /// Run a closing round trip, then terminate the session whatever the
    /// outcome.
    pub fn close<T, E, B, I>(
        &self,
        build: B,
        interpret: I,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> RpcFuture<T>
    where
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        B: FnOnce(&mut String) -> Result<MessageId, E>,
        I: FnOnce(&str, MessageId) -> Result<T, E> + Send + 'static,
    {
        let span = close_span(self.inner.config.tracing());
        let timing = timing_start(self.inner.config.tracing().close_timing);
        let round_trip =
            self.request_then_interpret(build, interpret, request_timeout, response_timeout);
        let inner = Arc::clone(&self.inner);

        self.spawn(
            async move {
                let result = round_trip.await;
                inner.terminate();
                record_result(&tracing::Span::current(), &result);
                emit_timing_event(timing);
                result
            }
            .instrument(span),
        )
    }
}

fn settle_hello<E, N>(
    inner: &SessionInner,
    reply: &str,
    negotiate: N,
) -> Result<Capabilities, RpcError>
where
    E: Into<BoxError>,
    N: FnOnce(&str) -> Result<Capabilities, E>,
{
    let capabilities = match negotiate(reply) {
        Ok(capabilities) => capabilities,
        Err(err) => {
            tracing::warn!("capability negotiation failed; terminating session");
            inner.terminate();
            return Err(RpcError::ResponseConsumption(err.into()));
        }
    };

    let upgrade = capabilities.supports_chunked_framing();
    if upgrade && let Some(engine) = inner.bridge.engine() {
        engine.upgrade_framing();
    }
    let framing = if upgrade { "chunked" } else { "end-of-message" };
    tracing::Span::current().record("framing", framing);
    inner.activate(capabilities.clone());
    Ok(capabilities)
}
