//! Error taxonomy for session transfers and round trips.
//!
//! Three layers exist. [`TransferError`] is the failure of a single request
//! or response future. [`RpcError`] is what callers of the round-trip
//! operations see: the transfer failure reclassified by the phase it happened
//! in, with timeouts kept distinguishable from other faults.
//! [`InitializationError`] covers attaching a channel to a session.

use std::{error::Error as StdError, io, time::Duration};

use crate::codec::CodecError;

/// Boxed error returned by caller-supplied request builders, reply
/// interpreters and capability negotiation.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Failures while attaching a channel to a session.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    /// The session already has a channel attached.
    #[error("session transport is already initialized")]
    AlreadyInitialized,
    /// No channel was attached before the wait budget ran out.
    #[error("session transport was not initialized within {elapsed:?}")]
    Timeout {
        /// Time spent waiting.
        elapsed: Duration,
    },
    /// The session was built outside a Tokio runtime without an explicit
    /// handle.
    #[error("no Tokio runtime available to drive the session")]
    NoRuntime,
}

/// Failure of one request or response future.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The deadline elapsed before the transfer completed.
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),
    /// The channel reported an I/O fault.
    #[error("channel error: {0}")]
    Io(#[from] io::Error),
    /// The inbound or outbound bytes violated the framing.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// The received message is not valid UTF-8.
    #[error("received message is not valid UTF-8")]
    Encoding(#[source] std::str::Utf8Error),
    /// The session was closed before the transfer could run.
    #[error("session is closed")]
    Closed,
    /// The transfer was dropped without completing.
    #[error("transfer was cancelled")]
    Cancelled,
    /// The session never became ready.
    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

impl TransferError {
    /// Whether this failure is a deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Initialization(InitializationError::Timeout { .. })
        )
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
            Self::Codec(_) => "codec",
            Self::Encoding(_) => "encoding",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Initialization(_) => "initialization",
        }
    }
}

/// Round-trip failures, classified by phase.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use netconf_async::{RpcError, TransferError};
///
/// let err = RpcError::RequestTimeout(TransferError::Timeout(Duration::from_secs(1)));
/// assert!(err.is_timeout());
/// assert_eq!(err.phase(), "request");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The session had no channel attached in time.
    #[error("session not initialized: {0}")]
    Initialization(#[source] InitializationError),
    /// Building the outgoing payload failed; nothing was sent.
    #[error("failed to generate request")]
    RequestGeneration(#[source] BoxError),
    /// Sending the request exceeded its deadline.
    #[error("request phase timed out")]
    RequestTimeout(#[source] TransferError),
    /// Sending the request failed.
    #[error("request phase failed")]
    RequestPhase(#[source] TransferError),
    /// Receiving the response exceeded its deadline.
    #[error("response phase timed out")]
    ResponseTimeout(#[source] TransferError),
    /// Receiving the response failed.
    #[error("response phase failed")]
    ResponsePhase(#[source] TransferError),
    /// The reply arrived but the interpreter rejected it.
    #[error("failed to consume response")]
    ResponseConsumption(#[source] BoxError),
    /// The background task driving the round trip stopped unexpectedly.
    #[error("round trip aborted")]
    Aborted,
}

impl RpcError {
    /// Classify a request-phase transfer failure.
    #[must_use]
    pub fn request(err: TransferError) -> Self {
        match err {
            TransferError::Initialization(init) => Self::Initialization(init),
            err if err.is_timeout() => Self::RequestTimeout(err),
            err => Self::RequestPhase(err),
        }
    }

    /// Classify a response-phase transfer failure.
    #[must_use]
    pub fn response(err: TransferError) -> Self {
        match err {
            TransferError::Initialization(init) => Self::Initialization(init),
            err if err.is_timeout() => Self::ResponseTimeout(err),
            err => Self::ResponsePhase(err),
        }
    }

    /// Whether a deadline expiry caused this failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout(_)
                | Self::ResponseTimeout(_)
                | Self::Initialization(InitializationError::Timeout { .. })
        )
    }

    /// Phase label for logs and metrics.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Initialization(_) => "initialization",
            Self::RequestGeneration(_) => "generation",
            Self::RequestTimeout(_) | Self::RequestPhase(_) => "request",
            Self::ResponseTimeout(_) | Self::ResponsePhase(_) => "response",
            Self::ResponseConsumption(_) => "consumption",
            Self::Aborted => "aborted",
        }
    }
}

/// Context carried inside the `io::Error` returned by
/// [`Transport::read_one`](crate::Transport::read_one).
#[derive(Debug, thiserror::Error)]
#[error("read failed after {elapsed:?} of {timeout:?}")]
pub struct BridgeReadError {
    /// Time spent before the failure surfaced.
    pub elapsed: Duration,
    /// Budget the read was given.
    pub timeout: Duration,
    /// Underlying cause.
    #[source]
    pub source: TransferError,
}

impl BridgeReadError {
    /// Map onto an `io::Error`, passing an inner I/O fault through unchanged.
    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self.source {
            TransferError::Io(err) => err,
            source => {
                let kind = if source.is_timeout() {
                    io::ErrorKind::TimedOut
                } else {
                    io::ErrorKind::Other
                };
                io::Error::new(kind, Self { source, ..self })
            }
        }
    }
}
