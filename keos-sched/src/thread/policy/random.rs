//! Uniformly random queues without donation.

use super::{DonationPolicy, Waiter};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Picks any waiter with equal probability.
#[derive(Debug, Clone)]
pub struct Random {
    rng: SmallRng,
}

impl Random {
    /// Creates a policy whose draws are reproducible from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl DonationPolicy for Random {
    const NAME: &'static str = "random";
    const PRIORITY_MINIMUM: u32 = 0;
    const PRIORITY_MAXIMUM: u32 = 7;
    const DONATES: bool = false;

    fn aggregate<I: Iterator<Item = u32>>(&self, base: u32, _donors: I) -> u32 {
        base
    }

    fn select(&mut self, waiters: &[Waiter]) -> Option<usize> {
        if waiters.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..waiters.len()))
    }
}
