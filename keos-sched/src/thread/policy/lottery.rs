//! # Lottery scheduling with ticket transfer.
//!
//! A lottery scheduler gives each thread a number of tickets. When a thread
//! has to be dequeued, a lottery is held among all the tickets of all the
//! waiting threads and the holder of the winning ticket is chosen. A thread's
//! chance of winning is its share of the tickets in the queue.
//!
//! Tickets are transferred through locks and joins like priorities are, but
//! they add up instead of taking the maximum: a holder owns its own tickets
//! plus every ticket of every thread waiting on its transfer-enabled queues,
//! transitively.
//!
//! Ticket counts can get large, so no state is kept per ticket. The draw is a
//! single random number in `[0, total)` followed by a walk over the waiters.
//! Zero tickets are not allowed: such a thread could never be picked.

use super::{DonationPolicy, Waiter};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Sum-aggregating policy used by the lottery scheduler.
#[derive(Debug, Clone)]
pub struct Lottery {
    rng: SmallRng,
}

impl Lottery {
    /// Creates a lottery whose draws are reproducible from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Sum of the tickets in `waiters`.
    pub fn total_tickets(waiters: &[Waiter]) -> u64 {
        waiters
            .iter()
            .map(|w| u64::from(w.effective_priority))
            .sum()
    }
}

impl DonationPolicy for Lottery {
    const NAME: &'static str = "lottery";
    const PRIORITY_MINIMUM: u32 = 1;
    const PRIORITY_MAXIMUM: u32 = 7;

    fn aggregate<I: Iterator<Item = u32>>(&self, base: u32, donors: I) -> u32 {
        donors.fold(base, u32::saturating_add)
    }

    fn select(&mut self, waiters: &[Waiter]) -> Option<usize> {
        let total = Self::total_tickets(waiters);
        if total == 0 {
            return None;
        }
        let mut draw = self.rng.gen_range(0..total);
        for (idx, waiter) in waiters.iter().enumerate() {
            let tickets = u64::from(waiter.effective_priority);
            if draw < tickets {
                return Some(idx);
            }
            draw -= tickets;
        }
        None
    }
}
