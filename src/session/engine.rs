//! Per-channel transfer engine.
//!
//! One [`Engine`] exists per attached channel. It owns the two single-flight
//! queues, the reusable send and decode buffers and the active framing, and
//! turns queued transfers into processors as the queues release them.

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::BytesMut;
use tokio::runtime::Handle;

use super::{
    config::SessionConfig,
    processor::{QueuedRequest, QueuedResponse, RequestProcessor, ResponseProcessor, Submission},
};
use crate::{
    channel::ByteChannel,
    codec::Framing,
    error::TransferError,
    metrics,
    queue::{Offer, SingleFlightQueue},
};

pub(crate) struct Engine {
    channel: Box<dyn ByteChannel>,
    runtime: Handle,
    writes: SingleFlightQueue<QueuedRequest>,
    reads: SingleFlightQueue<QueuedResponse>,
    /// Parked while no request is in flight.
    send_buffer: Mutex<Option<BytesMut>>,
    /// Parked while no response is in flight.
    decode_buffer: Mutex<Option<BytesMut>>,
    send_buffer_capacity: usize,
    decode_buffer_capacity: usize,
    chunked: AtomicBool,
    closed: AtomicBool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("framing", &self.framing())
            .field("closed", &self.is_closed())
            .field("pending_writes", &self.writes.pending())
            .field("pending_reads", &self.reads.pending())
            .finish_non_exhaustive()
    }
}

fn take_buffer(slot: &Mutex<Option<BytesMut>>, capacity: usize) -> BytesMut {
    let parked = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    parked.unwrap_or_else(|| BytesMut::with_capacity(capacity))
}

fn park_buffer(slot: &Mutex<Option<BytesMut>>, buffer: BytesMut) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(buffer),
        Err(poisoned) => *poisoned.into_inner() = Some(buffer),
    }
}

/// Empty `buffer` and make room for `wanted` bytes.
///
/// Encoding advances the buffer's start; on a uniquely owned buffer
/// `reserve` moves it back instead of allocating.
fn reclaim(buffer: &mut BytesMut, wanted: usize) {
    buffer.clear();
    buffer.reserve(wanted);
}

impl Engine {
    pub(crate) fn new(channel: Box<dyn ByteChannel>, runtime: Handle, config: &SessionConfig) -> Self {
        let send_buffer_capacity = config.send_buffer_capacity_value();
        let decode_buffer_capacity = config.decode_buffer_capacity_value();
        Self {
            channel,
            runtime,
            writes: SingleFlightQueue::new(),
            reads: SingleFlightQueue::new(),
            send_buffer: Mutex::new(Some(BytesMut::with_capacity(send_buffer_capacity))),
            decode_buffer: Mutex::new(Some(BytesMut::with_capacity(decode_buffer_capacity))),
            send_buffer_capacity,
            decode_buffer_capacity,
            chunked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn framing(&self) -> Framing {
        if self.chunked.load(Ordering::Acquire) {
            Framing::Chunked
        } else {
            Framing::EndOfMessage
        }
    }

    /// Switch to chunked framing for every transfer dispatched from now on.
    pub(crate) fn upgrade_framing(&self) {
        let upgraded = self
            .chunked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if upgraded {
            tracing::info!(framing = %Framing::Chunked, "framing upgraded");
        } else {
            tracing::debug!("framing already chunked");
        }
    }

    pub(crate) fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    /// Queue `submission` on its direction.
    ///
    /// A write that carries a reply slot registers it on the read side as
    /// soon as the request has been sent.
    pub(crate) fn submit(self: &Arc<Self>, submission: Submission) {
        match submission {
            Submission::Write(request) => self.enqueue_write(request),
            Submission::Read(response) => self.expect_reply(response),
        }
    }

    fn enqueue_write(self: &Arc<Self>, request: QueuedRequest) {
        if self.is_closed() {
            request.fail(TransferError::Closed);
            return;
        }
        match self.writes.offer(request) {
            Offer::Dispatch(request) => self.dispatch_write(request),
            Offer::Queued => tracing::trace!(
                pending = self.writes.pending(),
                "request queued behind in-flight write"
            ),
        }
    }

    fn expect_reply(self: &Arc<Self>, response: QueuedResponse) {
        if self.is_closed() {
            response.fail(TransferError::Closed);
            return;
        }
        match self.reads.offer(response) {
            Offer::Dispatch(response) => self.dispatch_read(response),
            Offer::Queued => tracing::trace!(
                pending = self.reads.pending(),
                "reply queued behind in-flight read"
            ),
        }
    }

    fn dispatch_write(self: &Arc<Self>, request: QueuedRequest) {
        if self.is_closed() {
            request.fail(TransferError::Closed);
            self.fail_parked_writes();
            return;
        }
        if request.completion.is_finished() {
            tracing::debug!("request expired before dispatch; skipped");
            request.fail(TransferError::Cancelled);
            if let Some(next) = self.writes.poll() {
                self.dispatch_write(next);
            }
            return;
        }
        let QueuedRequest {
            text,
            completion,
            timeout,
            reply,
        } = request;
        completion.arm_timer(&self.runtime, timeout);

        let mut staged = take_buffer(&self.send_buffer, self.send_buffer_capacity);
        reclaim(&mut staged, text.len());
        staged.extend_from_slice(text.as_bytes());

        let framing = self.framing();
        tracing::debug!(bytes = text.len(), %framing, "dispatching request");
        self.channel.write(Box::new(RequestProcessor {
            engine: Arc::downgrade(self),
            completion,
            reply,
            codec: framing.codec(),
            staged,
        }));
    }

    fn dispatch_read(self: &Arc<Self>, response: QueuedResponse) {
        if self.is_closed() {
            response.fail(TransferError::Closed);
            self.fail_parked_reads();
            return;
        }
        if response.completion.is_finished() {
            tracing::debug!("reply read expired before dispatch; skipped");
            if let Some(next) = self.reads.poll() {
                self.dispatch_read(next);
            }
            return;
        }
        let QueuedResponse {
            completion,
            timeout,
        } = response;
        completion.arm_timer(&self.runtime, timeout);

        let framing = self.framing();
        tracing::debug!(%framing, "dispatching reply read");
        self.channel.read(Box::new(ResponseProcessor {
            engine: Arc::downgrade(self),
            completion,
            codec: framing.codec(),
            buffer: take_buffer(&self.decode_buffer, self.decode_buffer_capacity),
        }));
    }

    /// Called by the in-flight request processor once it finished.
    ///
    /// The reply slot is registered before the next write starts so replies
    /// pair with requests in send order.
    pub(crate) fn write_finished(
        self: &Arc<Self>,
        mut staged: BytesMut,
        reply: Option<QueuedResponse>,
    ) {
        reclaim(&mut staged, self.send_buffer_capacity);
        park_buffer(&self.send_buffer, staged);
        if let Some(reply) = reply {
            self.expect_reply(reply);
        }
        if let Some(next) = self.writes.poll() {
            self.dispatch_write(next);
        }
    }

    /// Called by the in-flight response processor once it finished.
    pub(crate) fn read_finished(self: &Arc<Self>, buffer: BytesMut) {
        park_buffer(&self.decode_buffer, buffer);
        if let Some(next) = self.reads.poll() {
            self.dispatch_read(next);
        }
    }

    fn fail_parked_writes(&self) {
        for request in self.writes.drain() {
            request.fail(TransferError::Closed);
        }
    }

    fn fail_parked_reads(&self) {
        for response in self.reads.drain() {
            response.fail(TransferError::Closed);
        }
    }

    /// Close the engine: shut the channel down and fail all parked work.
    ///
    /// In-flight processors fail through the channel. Returns `false` if the
    /// engine was already closed.
    pub(crate) fn terminate(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!("terminating session engine");
        self.channel.shutdown();
        self.fail_parked_writes();
        self.fail_parked_reads();
        metrics::dec_sessions();
        true
    }
}

#[cfg(test)]
impl Engine {
    /// Capacity of the parked send buffer, `None` while a write holds it.
    pub(crate) fn parked_send_capacity(&self) -> Option<usize> {
        match self.send_buffer.lock() {
            Ok(guard) => guard.as_ref().map(BytesMut::capacity),
            Err(poisoned) => poisoned.into_inner().as_ref().map(BytesMut::capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::reclaim;
    use crate::codec::{EndOfMessageCodec, MessageCodec};

    #[test]
    fn reclaim_recovers_space_advanced_over_by_encoding() {
        let mut staged = BytesMut::with_capacity(4096);
        staged.extend_from_slice(&[b'x'; 1000]);
        let mut wire = BytesMut::with_capacity(2048);
        let done = EndOfMessageCodec::default()
            .encode(&mut staged, &mut wire)
            .expect("encodes");
        assert!(done);
        assert!(staged.capacity() < 4096);

        reclaim(&mut staged, 1000);
        assert!(staged.is_empty());
        assert!(staged.capacity() >= 4096);
    }
}
