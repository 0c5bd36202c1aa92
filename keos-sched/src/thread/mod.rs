//! Per-thread scheduling state.
//!
//! ## The threading model
//!
//! The thread runtime owns threads; the scheduler only ever sees a thread's
//! identity, a [`Tid`]. Exactly one [`SchedState`] is attached to each
//! thread the first time the scheduler hears about it, and it lives until the
//! runtime detaches it when the thread finishes.
//!
//! Threads and wait queues point at each other (a queue knows its holder,
//! a thread knows the queues it holds and the one it waits on). None of
//! these links owns anything: they are indices into the scheduler's tables,
//! so the donation walk is a sequence of lookups.
pub mod policy;
pub mod queue;
pub mod scheduler;

use alloc::vec::Vec;
use core::fmt;
use queue::WaitQueue;

/// Thread identifier handed out by the thread runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u64);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid#{}", self.0)
    }
}

/// The logical time a thread entered a wait queue.
///
/// `tick` comes from the machine timer. Many enqueues can happen within one
/// tick, so `seq`, a per-scheduler insertion counter, orders those.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Timer ticks at insertion.
    pub tick: u64,
    /// Insertion order within the scheduler.
    pub seq: u64,
}

/// The scheduling state of a thread.
///
/// This holds the thread's priority, its effective priority, the queues it
/// owns, and the queue it's waiting for, if any.
#[derive(Debug, Clone)]
pub struct SchedState {
    pub(crate) priority: u32,
    pub(crate) effective_priority: u32,
    pub(crate) held: Vec<WaitQueue>,
    pub(crate) waiting_on: Option<WaitQueue>,
    pub(crate) enqueued_at: Timestamp,
}

impl SchedState {
    pub(crate) fn new(priority: u32) -> Self {
        Self {
            priority,
            effective_priority: priority,
            held: Vec::new(),
            waiting_on: None,
            enqueued_at: Timestamp::default(),
        }
    }

    /// Base priority, as last set with `set_priority`.
    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Priority after donations.
    #[inline]
    pub fn effective_priority(&self) -> u32 {
        self.effective_priority
    }

    /// Queues this thread has been granted.
    #[inline]
    pub fn held_queues(&self) -> &[WaitQueue] {
        &self.held
    }

    /// The queue this thread is blocked on.
    #[inline]
    pub fn waiting_on(&self) -> Option<WaitQueue> {
        self.waiting_on
    }

    /// When the thread entered the queue it waits on (or last waited on).
    #[inline]
    pub fn enqueued_at(&self) -> Timestamp {
        self.enqueued_at
    }

    /// True while the thread neither waits on nor holds any queue.
    pub fn is_detached(&self) -> bool {
        self.waiting_on.is_none() && self.held.is_empty()
    }
}
