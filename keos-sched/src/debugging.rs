//! Debugging utilities.
//!
//! [`dump_queue`] prints a wait queue to the console. [`Violation`] is what
//! [`DonationScheduler::verify`] reports when the donation graph is
//! inconsistent.
//!
//! [`DonationScheduler::verify`]: crate::thread::scheduler::DonationScheduler::verify

use crate::thread::{Tid, queue::WaitQueue, scheduler::Scheduler};
use core::fmt;

/// A broken scheduler invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// A base priority is outside of the policy's range.
    PriorityOutOfRange {
        /// The thread.
        tid: Tid,
        /// Its base priority.
        priority: u32,
    },
    /// A cached effective priority differs from a full recomputation.
    EffectivePriority {
        /// The thread.
        tid: Tid,
        /// Recomputed value.
        expected: u32,
        /// Cached value.
        actual: u32,
    },
    /// A thread claims to wait on a queue that does not list it.
    NotEnqueued {
        /// The thread.
        tid: Tid,
        /// The queue it claims to wait on.
        queue: WaitQueue,
    },
    /// A queue lists a thread that does not wait on it.
    StrayWaiter {
        /// The listed thread.
        tid: Tid,
        /// The queue.
        queue: WaitQueue,
    },
    /// A queue's holder and the holder's held queues disagree.
    Holder {
        /// The queue.
        queue: WaitQueue,
        /// The thread that claims to hold it, if any.
        expected: Option<Tid>,
        /// The holder recorded by the queue.
        actual: Option<Tid>,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::PriorityOutOfRange { tid, priority } => {
                write!(f, "{tid} has priority {priority} out of range")
            }
            Violation::EffectivePriority {
                tid,
                expected,
                actual,
            } => write!(
                f,
                "{tid} has effective priority {actual}, recomputed {expected}"
            ),
            Violation::NotEnqueued { tid, queue } => {
                write!(f, "{tid} waits on {queue} but is not listed by it")
            }
            Violation::StrayWaiter { tid, queue } => {
                write!(f, "{queue} lists {tid} which waits elsewhere")
            }
            Violation::Holder {
                queue,
                expected,
                actual,
            } => write!(
                f,
                "{queue} is held by {actual:?}, but {expected:?} claims it"
            ),
        }
    }
}

/// Print the holder and every waiter of `queue` with their base and
/// effective priorities.
pub fn dump_queue(scheduler: &dyn Scheduler, queue: WaitQueue) {
    let holder = scheduler.holder(queue);
    info!(
        "{} {queue} (transfer: {}, holder: {holder:?}):",
        scheduler.policy_name(),
        scheduler.transfers_priority(queue)
    );
    for tid in scheduler.waiters(queue) {
        info!(
            "    {tid}: priority {}, effective {}",
            scheduler.get_priority(tid),
            scheduler.get_effective_priority(tid)
        );
    }
}
