#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for the single-flight queue using loom.
//!
//! These tests exercise `SingleFlightQueue` without Tokio. `loom` explores
//! the interleavings of concurrent submitters and the completing processor to
//! ensure every item is dispatched exactly once and never two at a time.

use loom::{model, sync::Arc, thread};
use netconf_async::queue::{Offer, SingleFlightQueue};

#[test]
fn concurrent_offers_dispatch_exactly_one() {
    model(|| {
        let queue = Arc::new(SingleFlightQueue::new());
        let q1 = Arc::clone(&queue);
        let q2 = Arc::clone(&queue);

        let t1 = thread::spawn(move || q1.offer(1u8));
        let t2 = thread::spawn(move || q2.offer(2u8));

        let outcomes = [
            t1.join().expect("first offer thread panicked"),
            t2.join().expect("second offer thread panicked"),
        ];
        let dispatched: Vec<u8> = outcomes
            .iter()
            .filter_map(|offer| match offer {
                Offer::Dispatch(item) => Some(*item),
                Offer::Queued => None,
            })
            .collect();
        assert_eq!(dispatched.len(), 1, "exactly one offer may dispatch");

        let parked = queue.poll().expect("the other item is parked");
        assert_ne!(parked, dispatched[0]);
        assert_eq!(queue.poll(), None);
        assert!(!queue.is_in_progress());
    });
}

#[test]
fn completion_racing_offer_never_strands_item() {
    model(|| {
        let queue = Arc::new(SingleFlightQueue::new());
        assert_eq!(queue.offer(1u8), Offer::Dispatch(1));

        let completer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.poll())
        };
        let submitter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.offer(2u8))
        };

        let polled = completer.join().expect("completer thread panicked");
        let offered = submitter.join().expect("submitter thread panicked");

        match (polled, offered) {
            (Some(2), Offer::Queued) => assert!(queue.is_in_progress()),
            (None, Offer::Dispatch(2)) => assert!(queue.is_in_progress()),
            other => panic!("item 2 stranded or duplicated: {other:?}"),
        }
        assert_eq!(queue.pending(), 0);
    });
}
