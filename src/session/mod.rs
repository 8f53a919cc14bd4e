//! Pipelined NETCONF session.
//!
//! A [`Session`] starts detached. Attaching a [`ByteChannel`] (directly, or
//! through [`SessionBuilder::connect`] for a Tokio stream) creates the
//! engine that drives the single-flight read and write queues. Every
//! submission method is a plain function that queues its work immediately,
//! in call order, and returns a future; the work itself runs on the runtime
//! the session captured, so callers on any thread may submit.
//!
//! # Lifecycle
//!
//! `Detached` → `Attached` (channel installed) → `Active` (hello exchanged,
//! framing possibly upgraded) → `Closed`. A closed session fails all further
//! work with [`TransferError::Closed`](crate::TransferError::Closed).

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::runtime::Handle;

mod builder;
mod config;
mod engine;
mod processor;
mod rpc;
mod tracing_config;
mod tracing_helpers;

pub use builder::SessionBuilder;
pub use config::SessionConfig;
pub(crate) use engine::Engine;
pub(crate) use processor::{QueuedResponse, Submission};
pub use rpc::RpcFuture;
pub use tracing_config::TracingConfig;

use crate::{
    bridge::TransportBridge,
    capabilities::Capabilities,
    channel::ByteChannel,
    codec::Framing,
    correlation::{MessageId, MessageIdGenerator},
    error::InitializationError,
    metrics,
};

/// Observable lifecycle state of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No channel attached yet.
    Detached,
    /// A channel is attached; no hello has been exchanged.
    Attached,
    /// Hello exchanged and capabilities known.
    Active,
    /// Terminated; no further work is accepted.
    Closed,
}

struct Lifecycle {
    state: SessionState,
    capabilities: Option<Capabilities>,
}

pub(crate) struct SessionInner {
    bridge: Arc<TransportBridge>,
    runtime: Handle,
    config: SessionConfig,
    ids: MessageIdGenerator,
    lifecycle: Mutex<Lifecycle>,
}

impl SessionInner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        match self.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn activate(&self, capabilities: Capabilities) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != SessionState::Closed {
            lifecycle.state = SessionState::Active;
        }
        lifecycle.capabilities = Some(capabilities);
    }

    pub(crate) fn terminate(&self) {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state == SessionState::Closed {
                return;
            }
            lifecycle.state = SessionState::Closed;
        }
        if let Some(engine) = self.bridge.close() {
            engine.terminate();
        }
        tracing::debug!("session terminated");
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) { self.terminate(); }
}

/// Handle to a pipelined session. Cloning shares the session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use netconf_async::Session;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (client, _server) = tokio::io::duplex(4096);
/// let session = Session::builder().connect(client).expect("runtime available");
/// let reply = session.rpc(
///     "<rpc message-id=\"1\"><get/></rpc>",
///     Duration::from_secs(1),
///     Duration::from_millis(10),
/// );
/// // Nobody answers on the other end of the duplex.
/// assert!(reply.await.expect_err("no server").is_timeout());
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("framing", &self.framing())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start configuring a session.
    #[must_use]
    pub fn builder() -> SessionBuilder { SessionBuilder::new() }

    pub(crate) fn new(runtime: Handle, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                bridge: Arc::new(TransportBridge::new(runtime.clone())),
                runtime,
                config,
                ids: MessageIdGenerator::default(),
                lifecycle: Mutex::new(Lifecycle {
                    state: SessionState::Detached,
                    capabilities: None,
                }),
            }),
        }
    }

    /// Attach the channel this session runs over.
    ///
    /// Work submitted earlier, still waiting within its request timeout, is
    /// released onto the new channel.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationError::AlreadyInitialized`] if a channel was
    /// attached before or the session has been terminated.
    pub fn attach<C: ByteChannel>(&self, channel: C) -> Result<(), InitializationError> {
        let engine = Arc::new(Engine::new(
            Box::new(channel),
            self.inner.runtime.clone(),
            &self.inner.config,
        ));
        self.inner.bridge.attach(engine)?;
        {
            let mut lifecycle = self.inner.lifecycle();
            if lifecycle.state == SessionState::Detached {
                lifecycle.state = SessionState::Attached;
            }
        }
        metrics::inc_sessions();
        tracing::debug!("session transport attached");
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.inner.lifecycle().state }

    /// Capabilities learned from the hello exchange.
    #[must_use]
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.inner.lifecycle().capabilities.clone()
    }

    /// Framing applied to transfers dispatched from now on.
    #[must_use]
    pub fn framing(&self) -> Framing {
        self.inner
            .bridge
            .engine()
            .map_or(Framing::EndOfMessage, |engine| engine.framing())
    }

    /// Next identifier for an outgoing `<rpc>`, starting at 1.
    #[must_use]
    pub fn next_message_id(&self) -> MessageId { self.inner.ids.next() }

    /// Blocking transport facade for collaborators that read synchronously.
    #[must_use]
    pub fn transport(&self) -> Arc<TransportBridge> { Arc::clone(&self.inner.bridge) }

    /// Close immediately without a close-session exchange.
    ///
    /// The channel is shut down, in-flight transfers fail through it and
    /// queued ones fail with [`TransferError::Closed`](crate::TransferError::Closed).
    pub fn terminate(&self) { self.inner.terminate(); }
}
