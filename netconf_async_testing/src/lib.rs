//! Utilities for exercising a [`Session`](netconf_async::Session) in tests.
//!
//! [`MockServer`] plays the server end of an in-memory duplex stream using
//! the crate's own framing codec. [`ScriptedChannel`] replaces the stream
//! altogether with a channel whose writes are captured, whose reads are fed
//! by the test and whose faults and delays are injected on demand.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use netconf_async_testing::{TestResult, session_pair};
//!
//! # async fn example() -> TestResult {
//! let (session, mut server) = session_pair()?;
//! let reply = session.rpc("<rpc message-id=\"1\"><get/></rpc>", Duration::from_secs(1), Duration::from_secs(1));
//! let request = server.recv().await?;
//! server.send(&format!("<rpc-reply>{request}</rpc-reply>")).await?;
//! assert!(reply.await?.starts_with("<rpc-reply>"));
//! # Ok(())
//! # }
//! ```

pub mod macros;
pub mod metrics;
pub mod mock_server;
pub mod scripted;

pub use metrics::{counter_value, debugging_recorder_setup, gauge_value};
pub use mock_server::{
    MockServer,
    hello_message,
    parse_capabilities,
    rpc_reply,
    session_pair,
    session_pair_with,
};
pub use scripted::{ScriptHandle, ScriptedChannel};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
