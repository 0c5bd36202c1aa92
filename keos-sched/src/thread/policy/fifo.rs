//! First-in-first-out queues without donation.

use super::{DonationPolicy, Waiter};

/// Hands the resource out in insertion order. Priorities are recorded but
/// never consulted, and no thread lends anything to another.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl DonationPolicy for Fifo {
    const NAME: &'static str = "fifo";
    const PRIORITY_MINIMUM: u32 = 0;
    const PRIORITY_MAXIMUM: u32 = 7;
    const DONATES: bool = false;

    fn aggregate<I: Iterator<Item = u32>>(&self, base: u32, _donors: I) -> u32 {
        base
    }

    fn select(&mut self, waiters: &[Waiter]) -> Option<usize> {
        if waiters.is_empty() { None } else { Some(0) }
    }
}
