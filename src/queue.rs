//! Per-direction single-flight work queue.
//!
//! A [`SingleFlightQueue`] admits at most one in-flight item. Offering an
//! item while nothing is in flight hands it straight back for dispatch; while
//! something is in flight the item is parked in FIFO order and later returned
//! by the [`poll`](SingleFlightQueue::poll) that follows the current item's
//! completion.

use std::collections::VecDeque;
#[cfg(not(loom))]
use std::sync::Mutex;

#[cfg(loom)]
use loom::sync::Mutex;

/// Outcome of [`SingleFlightQueue::offer`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dispatched item must be started by the caller"]
pub enum Offer<T> {
    /// Nothing was in flight; the caller must start this item now.
    Dispatch(T),
    /// The item was parked behind the in-flight one.
    Queued,
}

#[derive(Debug)]
struct State<T> {
    pending: VecDeque<T>,
    in_progress: bool,
}

/// FIFO queue with a single in-flight slot.
///
/// All operations take the same lock, so the single-flight invariant holds
/// under concurrent producers.
///
/// # Examples
///
/// ```
/// use netconf_async::queue::{Offer, SingleFlightQueue};
///
/// let queue = SingleFlightQueue::new();
/// assert_eq!(queue.offer(1), Offer::Dispatch(1));
/// assert_eq!(queue.offer(2), Offer::Queued);
/// assert_eq!(queue.poll(), Some(2));
/// assert_eq!(queue.poll(), None);
/// assert!(!queue.is_in_progress());
/// ```
#[derive(Debug)]
pub struct SingleFlightQueue<T> {
    state: Mutex<State<T>>,
}

impl<T> Default for SingleFlightQueue<T> {
    fn default() -> Self { Self::new() }
}

impl<T> SingleFlightQueue<T> {
    /// Create an idle, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                in_progress: false,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<T>) -> R) -> R {
        // A poisoned lock still holds consistent bookkeeping: no user code
        // runs while it is held.
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Submit an item.
    ///
    /// Marks the queue in progress and returns [`Offer::Dispatch`] if it was
    /// idle; otherwise parks the item and returns [`Offer::Queued`].
    pub fn offer(&self, item: T) -> Offer<T> {
        self.with_state(|state| {
            if state.in_progress {
                state.pending.push_back(item);
                Offer::Queued
            } else {
                state.in_progress = true;
                Offer::Dispatch(item)
            }
        })
    }

    /// Take the next parked item after the in-flight one finished.
    ///
    /// Returns `None` and clears the in-progress flag when nothing is parked.
    pub fn poll(&self) -> Option<T> {
        self.with_state(|state| {
            let next = state.pending.pop_front();
            if next.is_none() {
                state.in_progress = false;
            }
            next
        })
    }

    /// Whether an item is currently in flight.
    #[must_use]
    pub fn is_in_progress(&self) -> bool { self.with_state(|state| state.in_progress) }

    /// Number of parked items, excluding the in-flight one.
    #[must_use]
    pub fn pending(&self) -> usize { self.with_state(|state| state.pending.len()) }

    /// Remove every parked item and mark the queue idle.
    ///
    /// Used when the session shuts down so parked work can be failed.
    pub fn drain(&self) -> Vec<T> {
        self.with_state(|state| {
            state.in_progress = false;
            state.pending.drain(..).collect()
        })
    }
}
