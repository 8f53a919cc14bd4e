//! Buffer processors binding one queued transfer to the channel.
//!
//! Queued work ([`QueuedRequest`], [`QueuedResponse`]) carries only the
//! caller-facing state. When the single-flight queue dispatches an item the
//! engine turns it into a processor by attaching a fresh codec and one of the
//! session's reusable buffers. The processor hands the buffer back and pulls
//! the next item when it finishes, so the buffers are only ever touched by
//! the one in-flight processor of their direction.

use std::{
    sync::Weak,
    time::Duration,
};

use bytes::BytesMut;
use tokio::runtime::Handle;

use super::engine::Engine;
use crate::{
    channel::{BufferProcessor, Progress},
    codec::{CodecError, MessageCodec, spare_capacity},
    completion::{Completion, Pending},
    error::TransferError,
    metrics::{self, Direction},
};

/// A request waiting for the write side.
#[derive(Debug)]
pub(crate) struct QueuedRequest {
    pub(crate) text: String,
    pub(crate) completion: Completion<()>,
    pub(crate) timeout: Duration,
    /// Reply slot registered on the read side once the request is sent.
    pub(crate) reply: Option<QueuedResponse>,
}

impl QueuedRequest {
    /// A request that expects no reply.
    pub(crate) fn one_way(text: String, timeout: Duration) -> (Self, Pending<()>) {
        let (completion, pending) = Completion::new();
        let request = Self {
            text,
            completion,
            timeout,
            reply: None,
        };
        (request, pending)
    }

    /// A request together with the reply slot that answers it.
    pub(crate) fn round_trip(
        text: String,
        timeout: Duration,
        reply_timeout: Duration,
    ) -> (Self, Pending<()>, Pending<String>) {
        let (reply, reply_pending) = QueuedResponse::new(reply_timeout);
        let (mut request, pending) = Self::one_way(text, timeout);
        request.reply = Some(reply);
        (request, pending, reply_pending)
    }

    pub(crate) fn fail(self, err: TransferError) {
        if let Some(reply) = self.reply {
            reply.completion.fail(TransferError::Cancelled);
        }
        self.completion.fail(err);
    }
}

/// A reply expectation waiting for the read side.
#[derive(Debug)]
pub(crate) struct QueuedResponse {
    pub(crate) completion: Completion<String>,
    pub(crate) timeout: Duration,
}

impl QueuedResponse {
    pub(crate) fn new(timeout: Duration) -> (Self, Pending<String>) {
        let (completion, pending) = Completion::new();
        (Self { completion, timeout }, pending)
    }

    pub(crate) fn fail(self, err: TransferError) { self.completion.fail(err); }
}

/// Work handed to a session, for either direction.
#[derive(Debug)]
pub(crate) enum Submission {
    Write(QueuedRequest),
    Read(QueuedResponse),
}

impl Submission {
    /// Phase budget, counted from dispatch.
    pub(crate) fn timeout(&self) -> Duration {
        match self {
            Self::Write(request) => request.timeout,
            Self::Read(response) => response.timeout,
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        match self {
            Self::Write(request) => request.timeout = timeout,
            Self::Read(response) => response.timeout = timeout,
        }
    }

    /// Whether the caller-facing future of the first phase already resolved.
    pub(crate) fn is_finished(&self) -> bool {
        match self {
            Self::Write(request) => request.completion.is_finished(),
            Self::Read(response) => response.completion.is_finished(),
        }
    }

    pub(crate) fn arm_attach_timer(&self, runtime: &Handle, budget: Duration) {
        match self {
            Self::Write(request) => request.completion.arm_attach_timer(runtime, budget),
            Self::Read(response) => response.completion.arm_attach_timer(runtime, budget),
        }
    }

    pub(crate) fn disarm(&self) {
        match self {
            Self::Write(request) => request.completion.disarm(),
            Self::Read(response) => response.completion.disarm(),
        }
    }

    pub(crate) fn fail(self, err: TransferError) {
        match self {
            Self::Write(request) => request.fail(err),
            Self::Read(response) => response.fail(err),
        }
    }
}

/// Encodes one staged request into successive write windows.
pub(crate) struct RequestProcessor {
    pub(crate) engine: Weak<Engine>,
    pub(crate) completion: Completion<()>,
    pub(crate) reply: Option<QueuedResponse>,
    pub(crate) codec: Box<dyn MessageCodec>,
    pub(crate) staged: BytesMut,
}

impl BufferProcessor for RequestProcessor {
    fn process(&mut self, buffer: &mut BytesMut) -> Result<Progress, CodecError> {
        let done = self.codec.encode(&mut self.staged, buffer)?;
        Ok(if done { Progress::Done } else { Progress::More })
    }

    fn completed(self: Box<Self>) {
        let Self {
            engine,
            completion,
            reply,
            mut staged,
            ..
        } = *self;
        metrics::inc_messages(Direction::Outbound);
        if !completion.complete(()) {
            tracing::debug!("request finished sending after its future resolved");
        }
        staged.clear();
        match engine.upgrade() {
            Some(engine) => engine.write_finished(staged, reply),
            None => {
                if let Some(reply) = reply {
                    reply.fail(TransferError::Closed);
                }
            }
        }
    }

    fn failed(self: Box<Self>, err: TransferError) {
        let Self {
            engine,
            completion,
            reply,
            mut staged,
            ..
        } = *self;
        if let Some(reply) = reply {
            reply.fail(TransferError::Cancelled);
        }
        if !completion.fail(err) {
            tracing::debug!("request failed after its future resolved");
        }
        staged.clear();
        if let Some(engine) = engine.upgrade() {
            engine.write_finished(staged, None);
        }
    }
}

/// Decodes one inbound message into the growable decode buffer.
pub(crate) struct ResponseProcessor {
    pub(crate) engine: Weak<Engine>,
    pub(crate) completion: Completion<String>,
    pub(crate) codec: Box<dyn MessageCodec>,
    pub(crate) buffer: BytesMut,
}

impl BufferProcessor for ResponseProcessor {
    fn process(&mut self, src: &mut BytesMut) -> Result<Progress, CodecError> {
        loop {
            if spare_capacity(&self.buffer) == 0 {
                // Double, keeping what is already decoded.
                let capacity = self.buffer.capacity().max(1);
                self.buffer.reserve(capacity);
            }
            if self.codec.decode(src, &mut self.buffer)? {
                return Ok(Progress::Done);
            }
            if src.is_empty() {
                return Ok(Progress::More);
            }
        }
    }

    fn completed(self: Box<Self>) {
        let Self {
            engine,
            completion,
            mut buffer,
            ..
        } = *self;
        metrics::inc_messages(Direction::Inbound);
        let outcome = std::str::from_utf8(&buffer)
            .map(str::to_owned)
            .map_err(TransferError::Encoding);
        buffer.clear();

        let delivered = match outcome {
            Ok(text) => completion.complete(text),
            Err(err) => completion.fail(err),
        };
        if !delivered {
            tracing::debug!("reply arrived after its future resolved; discarded");
        }
        if let Some(engine) = engine.upgrade() {
            engine.read_finished(buffer);
        }
    }

    fn failed(self: Box<Self>, err: TransferError) {
        let Self {
            engine,
            completion,
            mut buffer,
            ..
        } = *self;
        if !completion.fail(err) {
            tracing::debug!("reply failed after its future resolved");
        }
        buffer.clear();
        if let Some(engine) = engine.upgrade() {
            engine.read_finished(buffer);
        }
    }
}
