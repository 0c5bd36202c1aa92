//! # KeOS scheduler: priority and lottery scheduling with donation
//!
//! This crate is the scheduler core of the kernel. The synchronization layer
//! (locks, semaphores, condition variables, joins) never picks a thread on
//! its own: every resource it guards owns a [`WaitQueue`], and the
//! [`Scheduler`] decides who gets the resource next.
//!
//! ## Priority inversion
//!
//! Suppose a low-priority thread `L` holds a lock, a high-priority thread
//! `H` waits for it, and a medium-priority thread `M` is runnable. `M` runs
//! instead of `L`, so `H` waits for `M` even though `H` is more important.
//! This is *priority inversion*.
//!
//! The fix is *priority donation*. While `H` waits on a queue that
//! transfers priority, `H` lends its effective priority to the queue's
//! holder `L`. Donation is transitive: if `L` is itself waiting on a lock
//! held by `T`, `T` receives it too. When `L` releases the lock it gets
//! back to its own priority.
//!
//! ## Policies
//!
//! [`DonationScheduler`] keeps the donation graph and delegates two
//! decisions to a [`DonationPolicy`]: how a holder's effective priority is
//! built from its donors, and which waiter is dispatched.
//!
//! - [`Priority`]: effective priority is the maximum over the donors; the
//!   highest waiter goes first, the oldest among equals.
//! - [`Lottery`]: effective priority is a ticket count, the sum over the
//!   donors; the waiter is drawn with probability proportional to its
//!   tickets.
//! - [`Fifo`] and [`Random`]: baselines without donation.
//!
//! ## Critical sections
//!
//! Every operation that changes scheduling state takes an
//! [`InterruptGuard`]. Holding one is the proof that interrupts are off, so
//! no timer interrupt can preempt a donation walk halfway through. The
//! kernel-wide scheduler is reached through [`with_scheduler`], which takes
//! the guard for you.
//!
//! ## Boot configuration
//!
//! The scheduler is picked at boot from the kernel command line with the
//! [`SystemConfigurationBuilder`].
//!
//! [`WaitQueue`]: thread::queue::WaitQueue
//! [`Scheduler`]: thread::scheduler::Scheduler
//! [`DonationScheduler`]: thread::scheduler::DonationScheduler
//! [`DonationPolicy`]: thread::policy::DonationPolicy
//! [`Priority`]: thread::policy::Priority
//! [`Lottery`]: thread::policy::Lottery
//! [`Fifo`]: thread::policy::Fifo
//! [`Random`]: thread::policy::Random
//! [`with_scheduler`]: thread::scheduler::with_scheduler
//! [`SystemConfigurationBuilder`]: config::SystemConfigurationBuilder
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
#![deny(missing_docs)]

#[macro_use]
extern crate abyss;
extern crate alloc;

pub use abyss::{debug, info, print, println, warning};

pub mod config;
pub mod debugging;
pub mod thread;

pub use abyss::interrupt::InterruptGuard;
pub use config::{Policy, SystemConfigurationBuilder, TraceFlags};
pub use thread::{
    Tid,
    queue::WaitQueue,
    scheduler::{DonationScheduler, Scheduler, set_scheduler, with_scheduler},
};

/// Represents the possible errors of a scheduler operation.
///
/// Contract violations (waiting twice, priorities out of range, deadlocks)
/// are not errors but kernel panics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KernelError {
    /// No such entry. (ENOENT)
    NoSuchEntry,
    /// Device or resource busy. (EBUSY)
    Busy,
    /// Invalid arguement. (EINVAL)
    InvalidArgument,
}

impl KernelError {
    /// Converts the [`KernelError`] into the error code returned to user
    /// programs.
    pub fn into_usize(self) -> usize {
        (match self {
            KernelError::NoSuchEntry => -2isize,
            KernelError::Busy => -16,
            KernelError::InvalidArgument => -22,
        }) as usize
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            KernelError::NoSuchEntry => write!(f, "no such entry"),
            KernelError::Busy => write!(f, "resource busy"),
            KernelError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}
