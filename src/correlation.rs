//! Message identifiers linking a request to its reply.
//!
//! The channel carries no correlation of its own: replies are paired with
//! requests strictly by order. The identifier generated while building a
//! request is handed to the reply interpreter so it can check the
//! `message-id` attribute if it wants to.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Identifier stamped on an outgoing `<rpc>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self { Self(id) }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Monotonic source of [`MessageId`]s, starting at 1.
#[derive(Debug)]
pub(crate) struct MessageIdGenerator {
    next: AtomicU64,
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl MessageIdGenerator {
    pub(crate) fn next(&self) -> MessageId { MessageId(self.next.fetch_add(1, Ordering::Relaxed)) }
}
