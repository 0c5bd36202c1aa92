//! Interrupt-disabling spinlock.
//!
//! On a uniprocessor a lock only needs to keep the holder from being
//! preempted, so acquiring a [`SpinLock`] disables interrupts for as long as
//! the guard lives. The atomic flag is still there so that a lock taken from
//! a second host thread (a test harness, for instance) is excluded as well.
//!
//! A guard must be released with [`SpinLockGuard::unlock`]. Letting it fall
//! out of scope is a bug and panics, reporting where the lock was taken.

use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    panic::Location,
    sync::atomic::{AtomicBool, Ordering},
};
use crossbeam_utils::{Backoff, CachePadded};

use crate::interrupt::InterruptGuard;

/// Returned by [`SpinLock::try_lock`] when the lock is taken.
#[derive(Debug)]
pub struct WouldBlock;

/// A lock around `T` that disables interrupts while held.
///
/// ```
/// use abyss::spinlock::SpinLock;
///
/// static TICKETS: SpinLock<u32> = SpinLock::new(0);
///
/// let mut tickets = TICKETS.lock();
/// *tickets += 1;
/// tickets.unlock();
/// ```
pub struct SpinLock<T: ?Sized> {
    held: CachePadded<AtomicBool>,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// An unlocked lock around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            held: CachePadded::new(AtomicBool::new(false)),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    fn grab(&self) -> Option<InterruptGuard> {
        let interrupts_off = InterruptGuard::new();
        match self.held.swap(true, Ordering::SeqCst) {
            false => Some(interrupts_off),
            true => None,
        }
    }

    /// Spins until the lock is free and takes it.
    ///
    /// Taking a lock the current thread already holds never returns.
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        loop {
            if let Some(interrupts_off) = self.grab() {
                return SpinLockGuard {
                    lock: self,
                    interrupts_off: Some(interrupts_off),
                    taken_at: Location::caller(),
                };
            }
            backoff.snooze();
        }
    }

    /// Takes the lock if it is free.
    ///
    /// # Errors
    /// [`WouldBlock`] if someone else holds it.
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        let interrupts_off = self.grab().ok_or(WouldBlock)?;
        Ok(SpinLockGuard {
            lock: self,
            interrupts_off: Some(interrupts_off),
            taken_at: Location::caller(),
        })
    }
}

/// Access to the value of a locked [`SpinLock`].
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    lock: &'a SpinLock<T>,
    interrupts_off: Option<InterruptGuard>,
    taken_at: &'static Location<'static>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// Releases the lock, then restores interrupts.
    pub fn unlock(mut self) {
        self.lock.held.store(false, Ordering::SeqCst);
        drop(self.interrupts_off.take());
        core::mem::forget(self);
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        panic!(
            "SpinLockGuard taken at {} dropped without `.unlock()`.",
            self.taken_at
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptState;

    #[test]
    fn lock_disables_interrupts() {
        let lock = SpinLock::new(5);
        let mut guard = lock.lock();
        assert_eq!(InterruptState::current(), InterruptState::Off);
        *guard += 1;
        guard.unlock();
        let guard = lock.lock();
        assert_eq!(*guard, 6);
        guard.unlock();
    }

    #[test]
    fn try_lock_would_block() {
        let lock = SpinLock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_err());
        guard.unlock();
        let guard = lock.try_lock().unwrap();
        guard.unlock();
    }
}
