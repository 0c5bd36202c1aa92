//! The abyss of the kernel that emulates the machine.
//!
//! The scheduler core runs on a simulated uniprocessor: there is exactly one
//! logical thread of control inside the kernel at any time, and the only
//! concurrency-control discipline is "disable interrupts". This crate
//! provides the pieces of that machine the scheduler consumes:
//!
//! - [`interrupt`]: the interrupt flag and the nesting [`InterruptGuard`]
//!   that turns it off for the duration of a critical section.
//! - [`spinlock`]: a [`SpinLock`] that holds an [`InterruptGuard`] while
//!   locked and must be unlocked explicitly.
//! - [`timer`]: the monotonic tick counter.
//! - [`kprint`]: the kernel console and its logging macros.
//!
//! You are **not** supposed to reach into this crate from the
//! synchronization layer. Use the re-exports of `keos-sched` instead.
//!
//! [`InterruptGuard`]: interrupt::InterruptGuard
//! [`SpinLock`]: spinlock::SpinLock
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
#![deny(missing_docs)]

use core::sync::atomic::AtomicBool;

extern crate alloc;

#[macro_use]
pub mod kprint;
pub mod interrupt;
pub mod spinlock;
pub mod timer;

/// Suppress the `info!`, `warning!` and `debug!` output when set.
#[doc(hidden)]
pub static QUIET: AtomicBool = AtomicBool::new(false);
