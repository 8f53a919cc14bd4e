#![doc(html_root_url = "https://docs.rs/netconf_async/latest")]
//! Public API for the `netconf_async` library.
//!
//! This crate provides a pipelined, future-based transport engine for
//! NETCONF sessions: message framing codecs, single-flight request and
//! response queues over a byte channel, and a session that pairs them into
//! round trips with separate request and response timeouts.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use netconf_async::{Capabilities, Session};
//!
//! # async fn run(stream: tokio::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::builder().connect(stream)?;
//! let capabilities = session
//!     .hello(
//!         "<hello><capabilities><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities></hello>",
//!         |reply: &str| -> Result<Capabilities, std::io::Error> {
//!             Ok(reply
//!                 .split("<capability>")
//!                 .skip(1)
//!                 .filter_map(|rest| rest.split_once("</capability>"))
//!                 .map(|(uri, _)| uri.trim().to_owned())
//!                 .collect())
//!         },
//!         Duration::from_secs(5),
//!         Duration::from_secs(5),
//!     )
//!     .await?;
//! assert!(capabilities.supports_chunked_framing());
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod capabilities;
pub mod channel;
pub mod codec;
mod completion;
pub mod correlation;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod session;

pub use bridge::{Transport, TransportBridge};
pub use capabilities::Capabilities;
pub use channel::{BufferProcessor, ByteChannel, Progress, StreamChannel};
pub use codec::{Framing, NetconfCodec};
pub use completion::Pending;
pub use correlation::MessageId;
pub use error::{BoxError, BridgeReadError, InitializationError, RpcError, TransferError};
pub use metrics::{Direction, MESSAGES_TOTAL, PHASE_FAILURES_TOTAL, SESSIONS_ACTIVE};
pub use session::{RpcFuture, Session, SessionBuilder, SessionConfig, SessionState, TracingConfig};
