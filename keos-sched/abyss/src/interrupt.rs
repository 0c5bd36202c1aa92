//! Interrupt
//!
//! The machine has a single interrupt flag. The scheduler treats "interrupts
//! are off" as its global lock: every decision about who runs next is made
//! while the flag is cleared. [`InterruptGuard`] is the RAII handle for that
//! state and doubles as the token scheduler entry points demand.
//!
//! The flag and the guard depth are process-wide. On a host, every thread of
//! the process shares them, so guards taken by concurrent host threads nest
//! into each other. Code that asserts on the flag itself has to be the only
//! guard user of its process.
use core::{
    marker::PhantomData,
    sync::atomic::{AtomicBool, AtomicIsize, Ordering, fence},
};

static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(true);
static NESTING: Nesting = Nesting {
    depth: AtomicIsize::new(0),
    restore_on: AtomicBool::new(true),
};

/// Depth of the live guards, and whether the flag was on when the outermost
/// one was taken.
struct Nesting {
    depth: AtomicIsize,
    restore_on: AtomicBool,
}

impl Nesting {
    fn enter(&self, was: InterruptState) {
        if self.depth.fetch_add(1, Ordering::SeqCst) == 0 {
            self.restore_on
                .store(was == InterruptState::On, Ordering::SeqCst);
        }
    }

    /// Returns true when the outermost guard left.
    fn leave(&self) -> bool {
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst);
        assert!(depth > 0, "InterruptGuard dropped more often than taken: {depth}");
        depth == 1
    }
}

/// State of the interrupt flag.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InterruptState {
    /// The timer may preempt the running thread.
    On,
    /// The running thread cannot be preempted.
    Off,
}

impl InterruptState {
    /// Reads the interrupt flag.
    pub fn current() -> Self {
        match INTERRUPT_FLAG.load(Ordering::SeqCst) {
            true => Self::On,
            false => Self::Off,
        }
    }

    /// Sets the interrupt flag.
    ///
    /// # Safety
    /// Enabling interrupts inside a critical section lets the timer preempt
    /// the thread that is mutating scheduling state.
    pub unsafe fn enable() {
        INTERRUPT_FLAG.store(true, Ordering::SeqCst);
    }

    /// Clears the interrupt flag.
    ///
    /// # Safety
    /// The caller is responsible for restoring the flag; prefer
    /// [`InterruptGuard`].
    pub unsafe fn disable() {
        INTERRUPT_FLAG.store(false, Ordering::SeqCst);
    }
}

/// Keeps interrupts disabled while alive.
///
/// Guards nest. Only dropping the outermost one restores the flag, and only
/// if interrupts were on when that one was taken. Drop guards in the reverse
/// order of their creation; scoping takes care of it unless a guard is
/// dropped by hand or stashed in a struct.
///
/// Scheduler entry points take `&InterruptGuard`; holding one is the proof
/// that the caller runs with interrupts disabled.
pub struct InterruptGuard {
    _not_send: PhantomData<*mut ()>,
}

impl InterruptGuard {
    /// Disables interrupts until the returned guard is dropped.
    pub fn new() -> Self {
        let was = InterruptState::current();
        unsafe { InterruptState::disable() };
        fence(Ordering::SeqCst);
        NESTING.enter(was);
        Self {
            _not_send: PhantomData,
        }
    }

    /// Returns true if at least one guard is alive.
    pub fn is_guarded() -> bool {
        NESTING.depth.load(Ordering::SeqCst) > 0
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if NESTING.leave() && NESTING.restore_on.load(Ordering::SeqCst) {
            unsafe { InterruptState::enable() };
        }
        fence(Ordering::SeqCst);
    }
}
