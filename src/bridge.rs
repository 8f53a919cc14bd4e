//! Transport bridge between a session and its channel.
//!
//! Every submission passes through the bridge. Once an engine is attached it
//! goes straight to the engine's queues; before that it is parked, in
//! submission order, and [`TransportBridge::attach`] hands the backlog to the
//! engine before anything submitted later can reach it. Parked work runs
//! against its first-phase budget: if no channel arrives in time it fails
//! with an initialization timeout, otherwise the unused part of the budget
//! carries over to the dispatched transfer.
//!
//! Blocking collaborators that need the classic "read one message" contract
//! go through [`Transport::read_one`], which parks a read like any other
//! submission and blocks on its future. Nothing else in the crate blocks.

use std::{
    collections::VecDeque,
    fmt,
    io,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use tokio::runtime::Handle;

use crate::{
    error::{BridgeReadError, InitializationError, TransferError},
    session::{Engine, QueuedResponse, Submission},
};

/// Blocking "read one complete message" contract.
pub trait Transport: Send + Sync {
    /// Read the next message, waiting at most `timeout` overall.
    ///
    /// Must be called from a blocking context, never from a runtime worker.
    ///
    /// # Errors
    ///
    /// Channel I/O failures are returned unchanged. Every other failure is
    /// wrapped in an [`io::Error`] carrying a [`BridgeReadError`]; its kind is
    /// [`io::ErrorKind::TimedOut`] when a deadline expired.
    fn read_one(&self, timeout: Duration) -> io::Result<String>;
}

/// A submission waiting for a channel.
struct Parked {
    submission: Submission,
    since: tokio::time::Instant,
}

impl Parked {
    /// Hand the submission to `engine` with what is left of its budget.
    fn release(self, engine: &Arc<Engine>) {
        let Self {
            mut submission,
            since,
        } = self;
        submission.disarm();
        let elapsed = since.elapsed();
        let remaining = submission.timeout().saturating_sub(elapsed);
        if submission.is_finished() || remaining.is_zero() {
            submission.fail(InitializationError::Timeout { elapsed }.into());
            return;
        }
        submission.set_timeout(remaining);
        engine.submit(submission);
    }
}

#[derive(Default)]
struct Slot {
    engine: Option<Arc<Engine>>,
    closed: bool,
    backlog: VecDeque<Parked>,
}

/// One-shot attachment point for a session's engine.
pub struct TransportBridge {
    slot: Mutex<Slot>,
    runtime: Handle,
}

impl fmt::Debug for TransportBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("TransportBridge")
            .field("attached", &slot.engine.is_some())
            .field("closed", &slot.closed)
            .field("parked", &slot.backlog.len())
            .finish_non_exhaustive()
    }
}

impl TransportBridge {
    pub(crate) fn new(runtime: Handle) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            runtime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Install `engine`, releasing parked work onto it in submission order.
    ///
    /// Succeeds once per bridge.
    pub(crate) fn attach(&self, engine: Arc<Engine>) -> Result<(), InitializationError> {
        let mut slot = self.lock();
        if slot.engine.is_some() || slot.closed {
            drop(slot);
            tracing::error!("session transport initialized twice");
            return Err(InitializationError::AlreadyInitialized);
        }
        let backlog = std::mem::take(&mut slot.backlog);
        if !backlog.is_empty() {
            tracing::debug!(parked = backlog.len(), "releasing parked submissions");
        }
        // Still under the lock: nothing submitted from here on can overtake
        // the backlog.
        for parked in backlog {
            parked.release(&engine);
        }
        slot.engine = Some(engine);
        Ok(())
    }

    /// The attached engine, if any.
    pub(crate) fn engine(&self) -> Option<Arc<Engine>> { self.lock().engine.clone() }

    /// Whether an engine has been attached.
    #[must_use]
    pub fn is_attached(&self) -> bool { self.lock().engine.is_some() }

    /// Route `submission` to the engine, or park it until one is attached.
    pub(crate) fn submit(&self, submission: Submission) {
        let engine = {
            let mut slot = self.lock();
            match &slot.engine {
                Some(engine) => Arc::clone(engine),
                None if slot.closed => {
                    drop(slot);
                    submission.fail(TransferError::Closed);
                    return;
                }
                None => {
                    submission.arm_attach_timer(&self.runtime, submission.timeout());
                    slot.backlog.retain(|parked| !parked.submission.is_finished());
                    slot.backlog.push_back(Parked {
                        submission,
                        since: tokio::time::Instant::now(),
                    });
                    tracing::debug!(
                        parked = slot.backlog.len(),
                        "no transport attached; submission parked"
                    );
                    return;
                }
            }
        };
        engine.submit(submission);
    }

    /// Mark the bridge closed and fail parked work. Returns the engine so
    /// the caller can shut it down.
    pub(crate) fn close(&self) -> Option<Arc<Engine>> {
        let (engine, backlog) = {
            let mut slot = self.lock();
            slot.closed = true;
            (slot.engine.clone(), std::mem::take(&mut slot.backlog))
        };
        for parked in backlog {
            parked.submission.fail(TransferError::Closed);
        }
        engine
    }
}

impl Transport for TransportBridge {
    fn read_one(&self, timeout: Duration) -> io::Result<String> {
        let start = Instant::now();
        let wrap = |source: TransferError| {
            BridgeReadError {
                elapsed: start.elapsed(),
                timeout,
                source,
            }
            .into_io()
        };

        let (response, reply) = QueuedResponse::new(timeout);
        self.submit(Submission::Read(response));
        futures::executor::block_on(reply).map_err(wrap)
    }
}
