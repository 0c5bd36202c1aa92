//! Monotonic tick counter of the emulated timer.
//!
//! The real hardware timer fires periodically and the handler calls
//! [`advance`]. Nothing ever moves the counter backwards.

use core::sync::atomic::{AtomicU64, Ordering};

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Current time in ticks since boot.
#[inline]
pub fn ticks() -> u64 {
    TICKS.load(Ordering::SeqCst)
}

/// Moves time forward by `n` ticks and returns the new time.
pub fn advance(n: u64) -> u64 {
    TICKS.fetch_add(n, Ordering::SeqCst) + n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let before = ticks();
        let after = advance(3);
        assert!(after >= before + 3);
        assert!(ticks() >= after);
    }
}
