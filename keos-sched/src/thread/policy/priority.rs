//! # Priority scheduling with priority donation.
//!
//! The next thread to leave a queue is always one whose effective priority is
//! no less than any other waiter's. Among the waiters with the highest
//! priority, the one that has waited the longest goes first, so equal
//! threads are served round-robin. A thread can still starve if there is
//! always a higher-priority waiter in front of it.
//!
//! Priority inversion is handled by donation. A holder's effective priority
//! is the maximum of its own priority and the effective priorities of every
//! thread waiting on a transfer-enabled queue it holds.

use super::{DonationPolicy, Waiter};

/// Max-aggregating policy used by the priority scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Priority;

impl Waiter {
    fn outranks(&self, other: &Waiter) -> bool {
        self.effective_priority > other.effective_priority
            || (self.effective_priority == other.effective_priority
                && self.enqueued_at < other.enqueued_at)
    }
}

impl DonationPolicy for Priority {
    const NAME: &'static str = "priority";
    const PRIORITY_MINIMUM: u32 = 0;
    const PRIORITY_MAXIMUM: u32 = 7;
    const MONOTONIC: bool = true;

    fn aggregate<I: Iterator<Item = u32>>(&self, base: u32, donors: I) -> u32 {
        donors.fold(base, u32::max)
    }

    fn select(&mut self, waiters: &[Waiter]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, waiter) in waiters.iter().enumerate() {
            match best {
                Some(b) if !waiter.outranks(&waiters[b]) => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{Tid, Timestamp};

    fn waiter(tid: u64, prio: u32, seq: u64) -> Waiter {
        Waiter {
            tid: Tid(tid),
            effective_priority: prio,
            enqueued_at: Timestamp { tick: 0, seq },
        }
    }

    #[test]
    fn highest_wins() {
        let waiters = [waiter(1, 3, 0), waiter(2, 6, 1), waiter(3, 5, 2)];
        assert_eq!(Priority.select(&waiters), Some(1));
    }

    #[test]
    fn oldest_breaks_ties() {
        let waiters = [waiter(1, 2, 9), waiter(2, 6, 4), waiter(3, 6, 3)];
        assert_eq!(Priority.select(&waiters), Some(2));
    }

    #[test]
    fn empty_selects_nothing() {
        assert_eq!(Priority.select(&[]), None);
    }

    #[test]
    fn aggregate_is_max() {
        assert_eq!(Priority.aggregate(1, [3, 7, 2].into_iter()), 7);
        assert_eq!(Priority.aggregate(5, core::iter::empty()), 5);
    }
}
