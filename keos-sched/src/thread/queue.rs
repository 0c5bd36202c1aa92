//! Wait queues.
//!
//! A wait queue belongs to one guarded resource (a lock, a join, a
//! semaphore). Threads that cannot get the resource wait on it, and the
//! thread that currently has the resource is its holder. A queue created with
//! `transfer_priority` lends the waiters' priority to the holder.
//!
//! The synchronization layer only keeps a [`WaitQueue`] handle; the state
//! lives in the scheduler and is never destroyed by it.

use super::Tid;
use alloc::vec::Vec;
use core::fmt;

/// Handle of a wait queue created by [`Scheduler::new_wait_queue`].
///
/// [`Scheduler::new_wait_queue`]: super::scheduler::Scheduler::new_wait_queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitQueue(pub(crate) usize);

impl fmt::Display for WaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wq#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WaitQueueState {
    pub(crate) transfer_priority: bool,
    pub(crate) holder: Option<Tid>,
    /// Insertion order. Selection never depends on it except through
    /// enqueue timestamps and the fifo baseline.
    pub(crate) waiters: Vec<Tid>,
}

impl WaitQueueState {
    pub(crate) fn new(transfer_priority: bool) -> Self {
        Self {
            transfer_priority,
            holder: None,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn position(&self, tid: Tid) -> Option<usize> {
        self.waiters.iter().position(|w| *w == tid)
    }
}
