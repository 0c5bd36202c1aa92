//! Scheduling policies.
//!
//! Every wait queue follows the same protocol (`wait_for_access`, `acquire`,
//! `next_thread`). What differs between schedulers is captured by a
//! [`DonationPolicy`]:
//!
//! - how a holder's effective priority is built from its own priority and
//!   what its waiters lend it ([`DonationPolicy::aggregate`]), and
//! - which waiter gets the resource next ([`DonationPolicy::select`]).
//!
//! | Policy       | Range | Aggregate | Selection                         |
//! |--------------|-------|-----------|-----------------------------------|
//! | [`Priority`] | 0..=7 | max       | highest, then longest waiting     |
//! | [`Lottery`]  | 1..=7 | sum       | weighted draw over tickets        |
//! | [`Fifo`]     | 0..=7 | none      | insertion order                   |
//! | [`Random`]   | 0..=7 | none      | uniform draw                      |

mod fifo;
mod lottery;
mod priority;
mod random;

pub use fifo::Fifo;
pub use lottery::Lottery;
pub use priority::Priority;
pub use random::Random;

use super::{Tid, Timestamp};

/// What a policy sees of one waiting thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Waiter {
    /// The waiting thread.
    pub tid: Tid,
    /// Its effective priority (or tickets).
    pub effective_priority: u32,
    /// When it entered the queue.
    pub enqueued_at: Timestamp,
}

/// Aggregation and selection rules plugged into a
/// [`DonationScheduler`](super::scheduler::DonationScheduler).
pub trait DonationPolicy: Send {
    /// Name reported by the scheduler.
    const NAME: &'static str;
    /// Lowest priority a thread can be given.
    const PRIORITY_MINIMUM: u32;
    /// Highest priority a thread can be given.
    const PRIORITY_MAXIMUM: u32;
    /// Priority of a thread the scheduler has not seen before.
    const PRIORITY_DEFAULT: u32 = 1;
    /// Whether waiters on a transfer-enabled queue lend anything to its
    /// holder. Queues of a non-donating policy do not even track holders.
    const DONATES: bool = true;
    /// Whether the aggregate is a maximum, so that a raised donor can be
    /// pushed up the holder chain without recomputing every holder.
    const MONOTONIC: bool = false;

    /// Effective priority of a thread with priority `base` whose waiters
    /// carry `donors`.
    fn aggregate<I: Iterator<Item = u32>>(&self, base: u32, donors: I) -> u32;

    /// Index in `waiters` of the thread to hand the resource to.
    fn select(&mut self, waiters: &[Waiter]) -> Option<usize>;
}
