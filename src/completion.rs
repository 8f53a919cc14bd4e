//! Exactly-once completion of request and response futures.
//!
//! A [`Completion`] is the write end held by a processor (and by its timer);
//! [`Pending`] is the future handed to the caller. Whichever of success,
//! failure or deadline expiry arrives first wins; later attempts are no-ops
//! and report `false`.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
    time::Duration,
};

use tokio::{runtime::Handle, sync::oneshot, task::AbortHandle};

use crate::error::{InitializationError, TransferError};

type Sender<T> = oneshot::Sender<Result<T, TransferError>>;

#[derive(Debug)]
struct Slot<T> {
    sender: Option<Sender<T>>,
    timer: Option<AbortHandle>,
}

/// Write end of a transfer future.
#[derive(Debug)]
pub(crate) struct Completion<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Create a linked completion/future pair.
    pub(crate) fn new() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            slot: Arc::new(Mutex::new(Slot {
                sender: Some(tx),
                timer: None,
            })),
        };
        (completion, Pending { rx })
    }

    /// Start the deadline for this transfer on `runtime`.
    ///
    /// Replaces any earlier deadline. Does nothing if the transfer already
    /// finished.
    pub(crate) fn arm_timer(&self, runtime: &Handle, timeout: Duration) {
        self.arm(runtime, timeout, TransferError::Timeout(timeout));
    }

    /// Start the deadline for a transfer parked until a channel is attached.
    pub(crate) fn arm_attach_timer(&self, runtime: &Handle, budget: Duration) {
        self.arm(
            runtime,
            budget,
            InitializationError::Timeout { elapsed: budget }.into(),
        );
    }

    fn arm(&self, runtime: &Handle, timeout: Duration, expired: TransferError) {
        let mut slot = lock(&self.slot);
        if slot.sender.is_none() {
            return;
        }
        let completion = self.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if completion.finish(Err(expired)) {
                tracing::debug!(?timeout, "transfer deadline expired");
            }
        });
        if let Some(previous) = slot.timer.replace(task.abort_handle()) {
            previous.abort();
        }
    }

    /// Cancel the running deadline, if any.
    pub(crate) fn disarm(&self) {
        if let Some(timer) = lock(&self.slot).timer.take() {
            timer.abort();
        }
    }

    /// Whether the future has already been resolved.
    pub(crate) fn is_finished(&self) -> bool { lock(&self.slot).sender.is_none() }

    /// Resolve the future successfully.
    pub(crate) fn complete(&self, value: T) -> bool { self.finish(Ok(value)) }

    /// Fail the future.
    pub(crate) fn fail(&self, err: TransferError) -> bool { self.finish(Err(err)) }

    fn finish(&self, outcome: Result<T, TransferError>) -> bool {
        let (sender, timer) = {
            let mut slot = lock(&self.slot);
            (slot.sender.take(), slot.timer.take())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        match sender {
            // The caller may have dropped the future; that is not an error.
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Future resolving to the outcome of one transfer.
///
/// Dropping it does not cancel the transfer: bytes already queued are still
/// sent or consumed so later transfers stay aligned.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, TransferError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, TransferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(TransferError::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_outcome_wins() {
        let (completion, pending) = Completion::<u8>::new();
        assert!(completion.complete(1));
        assert!(!completion.fail(TransferError::Closed));
        assert!(!completion.complete(2));
        assert_eq!(pending.await.expect("resolved"), 1);
    }

    #[tokio::test]
    async fn dropped_completion_cancels_future() {
        let (completion, pending) = Completion::<()>::new();
        drop(completion);
        assert!(matches!(pending.await, Err(TransferError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fails_unfinished_transfer() {
        let (completion, pending) = Completion::<()>::new();
        completion.arm_timer(&Handle::current(), Duration::from_millis(50));

        let err = pending.await.expect_err("deadline should expire");
        assert!(matches!(err, TransferError::Timeout(d) if d == Duration::from_millis(50)));
        assert!(!completion.complete(()), "late completion must be ignored");
    }

    #[tokio::test(start_paused = true)]
    async fn attach_timer_reports_initialization_timeout() {
        let (completion, pending) = Completion::<()>::new();
        completion.arm_attach_timer(&Handle::current(), Duration::from_secs(1));

        let err = pending.await.expect_err("never attached");
        assert!(matches!(
            err,
            TransferError::Initialization(InitializationError::Timeout { elapsed })
                if elapsed == Duration::from_secs(1)
        ));
        assert!(completion.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_transfer_outlives_its_deadline() {
        let (completion, pending) = Completion::<u8>::new();
        completion.arm_attach_timer(&Handle::current(), Duration::from_millis(10));
        completion.disarm();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!completion.is_finished());
        assert!(completion.complete(3));
        assert_eq!(pending.await.expect("resolved"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_disarms_timer() {
        let (completion, pending) = Completion::<&str>::new();
        completion.arm_timer(&Handle::current(), Duration::from_millis(50));
        assert!(completion.complete("done"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pending.await.expect("resolved"), "done");
    }
}
