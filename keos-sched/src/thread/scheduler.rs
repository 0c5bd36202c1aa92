//! Thread scheduler
//!
//! The [`Scheduler`] trait is the interface the synchronization layer uses:
//! it creates wait queues, parks threads on them, hands resources over and
//! manipulates priorities. [`DonationScheduler`] implements it once for every
//! [`DonationPolicy`].
//!
//! Every call that reads and then mutates scheduling state takes an
//! [`InterruptGuard`]: the scheduler must never be preempted halfway through
//! a donation walk.

use super::{
    SchedState, Tid, Timestamp,
    policy::{DonationPolicy, Fifo, Waiter},
    queue::{WaitQueue, WaitQueueState},
};
use crate::{KernelError, config::TraceFlags, debugging::Violation};
use abyss::{interrupt::InterruptGuard, spinlock::SpinLock};
use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};

/// A trait for a thread scheduler.
///
/// A scheduler decides, among the threads waiting for a resource, which one
/// gets it next. Implementations may donate priority from waiters to the
/// thread holding the resource to solve priority inversion.
pub trait Scheduler {
    /// Name of the scheduling policy.
    fn policy_name(&self) -> &'static str;

    /// Inclusive bounds of a thread's priority.
    fn priority_range(&self) -> (u32, u32);

    /// Allocate a new wait queue.
    ///
    /// # Arguments
    ///
    /// * `transfer_priority` - `true` if this queue should transfer priority
    ///   from waiting threads to the owning thread.
    fn new_wait_queue(&mut self, transfer_priority: bool) -> WaitQueue;

    /// Park `tid` on `queue` because it cannot get the resource right away.
    ///
    /// If the queue has a holder and transfers priority, the holder (and
    /// everyone the holder waits behind) is updated immediately.
    ///
    /// # Panics
    /// If `tid` already waits on a queue, or if waiting would make `tid`
    /// wait on itself through a chain of holders.
    fn wait_for_access(&mut self, guard: &InterruptGuard, queue: WaitQueue, tid: Tid);

    /// Grant `queue` to `tid` without contention.
    ///
    /// # Panics
    /// If threads still wait on `queue`, or if `tid` is waiting on a queue.
    fn acquire(&mut self, guard: &InterruptGuard, queue: WaitQueue, tid: Tid);

    /// Release `queue` from its holder and grant it to the waiter chosen by
    /// the policy. Returns `None`, leaving the queue free, when nobody waits.
    fn next_thread(&mut self, guard: &InterruptGuard, queue: WaitQueue) -> Option<Tid>;

    /// The thread [`next_thread`] would choose, without modifying the queue.
    ///
    /// For randomized policies this holds a fresh draw; the actual dispatch
    /// may pick someone else.
    ///
    /// [`next_thread`]: Scheduler::next_thread
    fn peek_next_thread(&mut self, guard: &InterruptGuard, queue: WaitQueue) -> Option<Tid>;

    /// Take `tid` off `queue` regardless of the policy (e.g. on timeout).
    ///
    /// # Errors
    /// [`KernelError::NoSuchEntry`] if `tid` does not wait on `queue`.
    fn remove(
        &mut self,
        guard: &InterruptGuard,
        queue: WaitQueue,
        tid: Tid,
    ) -> Result<(), KernelError>;

    /// Base priority of `tid`.
    fn get_priority(&self, tid: Tid) -> u32;

    /// Effective priority of `tid`, after donations.
    fn get_effective_priority(&self, tid: Tid) -> u32;

    /// Set the base priority of `tid`.
    ///
    /// # Panics
    /// If `priority` is out of [`Scheduler::priority_range`].
    fn set_priority(&mut self, guard: &InterruptGuard, tid: Tid, priority: u32);

    /// Raise the base priority of `tid` by one. Returns `false` at the
    /// maximum.
    fn increase_priority(&mut self, guard: &InterruptGuard, tid: Tid) -> bool {
        let (_, max) = self.priority_range();
        let priority = self.get_priority(tid);
        if priority >= max {
            return false;
        }
        self.set_priority(guard, tid, priority + 1);
        true
    }

    /// Lower the base priority of `tid` by one. Returns `false` at the
    /// minimum.
    fn decrease_priority(&mut self, guard: &InterruptGuard, tid: Tid) -> bool {
        let (min, _) = self.priority_range();
        let priority = self.get_priority(tid);
        if priority <= min {
            return false;
        }
        self.set_priority(guard, tid, priority - 1);
        true
    }

    /// The thread currently granted `queue`.
    fn holder(&self, queue: WaitQueue) -> Option<Tid>;

    /// Threads waiting on `queue`, in insertion order.
    fn waiters(&self, queue: WaitQueue) -> Vec<Tid>;

    /// Whether `queue` lends its waiters' priority to its holder.
    fn transfers_priority(&self, queue: WaitQueue) -> bool;

    /// The queue `tid` is blocked on.
    fn waiting_on(&self, tid: Tid) -> Option<WaitQueue>;

    /// Queues `tid` currently holds.
    fn held_queues(&self, tid: Tid) -> Vec<WaitQueue>;

    /// Forget the scheduling state of a finished thread.
    ///
    /// # Errors
    /// [`KernelError::Busy`] while `tid` still waits on or holds a queue.
    fn detach_thread(&mut self, guard: &InterruptGuard, tid: Tid) -> Result<(), KernelError>;
}

/// A scheduler that keeps the donation graph and delegates aggregation and
/// selection to `P`.
///
/// Threads and queues live in tables owned by the scheduler. A thread's
/// state is created the first time the thread waits, acquires or gets a
/// priority, and stays until [`Scheduler::detach_thread`].
pub struct DonationScheduler<P: DonationPolicy> {
    policy: P,
    threads: BTreeMap<Tid, SchedState>,
    queues: Vec<WaitQueueState>,
    seq: u64,
    trace: TraceFlags,
}

impl<P: DonationPolicy> DonationScheduler<P> {
    /// Create a scheduler following `policy`.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            threads: BTreeMap::new(),
            queues: Vec::new(),
            seq: 0,
            trace: TraceFlags::empty(),
        }
    }

    /// Log the scheduler events in `trace`.
    pub fn with_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    /// Scheduling state of `tid`, if the scheduler has seen it.
    pub fn state(&self, tid: Tid) -> Option<&SchedState> {
        self.threads.get(&tid)
    }

    /// Number of threads with scheduling state.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    #[track_caller]
    fn queue(&self, queue: WaitQueue) -> &WaitQueueState {
        match self.queues.get(queue.0) {
            Some(q) => q,
            None => panic!("{queue} was not created by this scheduler"),
        }
    }

    #[track_caller]
    fn queue_mut(&mut self, queue: WaitQueue) -> &mut WaitQueueState {
        match self.queues.get_mut(queue.0) {
            Some(q) => q,
            None => panic!("{queue} was not created by this scheduler"),
        }
    }

    fn state_mut(&mut self, tid: Tid) -> &mut SchedState {
        self.threads
            .entry(tid)
            .or_insert_with(|| SchedState::new(P::PRIORITY_DEFAULT))
    }

    fn effective_of(&self, tid: Tid) -> u32 {
        self.threads
            .get(&tid)
            .map_or(P::PRIORITY_DEFAULT, |s| s.effective_priority)
    }

    fn stamp(&mut self) -> Timestamp {
        let seq = self.seq;
        self.seq += 1;
        Timestamp {
            tick: abyss::timer::ticks(),
            seq,
        }
    }

    /// Effective priority of `tid` computed from scratch out of its own
    /// priority and every waiter of every transfer-enabled queue it holds.
    fn calc_effective_priority(&self, tid: Tid) -> u32 {
        let Some(state) = self.threads.get(&tid) else {
            return P::PRIORITY_DEFAULT;
        };
        if !P::DONATES {
            return state.priority;
        }
        let donors = state
            .held
            .iter()
            .map(|q| &self.queues[q.0])
            .filter(|q| q.transfer_priority)
            .flat_map(|q| q.waiters.iter())
            .map(|w| self.effective_of(*w));
        self.policy.aggregate(state.priority, donors)
    }

    /// The thread that receives `tid`'s donation: the holder of the queue
    /// `tid` waits on, if that queue transfers priority.
    fn donee(&self, tid: Tid) -> Option<Tid> {
        let queue = &self.queues[self.threads.get(&tid)?.waiting_on?.0];
        if P::DONATES && queue.transfer_priority {
            queue.holder
        } else {
            None
        }
    }

    /// Recompute `tid` and walk up the holder chain for as long as the
    /// recomputed value changes.
    fn propagate(&mut self, tid: Tid) {
        let mut next = Some(tid);
        let mut hops = 0;
        while let Some(tid) = next.take() {
            let effective = self.calc_effective_priority(tid);
            let state = self.state_mut(tid);
            if state.effective_priority == effective {
                break;
            }
            let old = core::mem::replace(&mut state.effective_priority, effective);
            self.trace_donation(tid, old, effective);
            next = self.donee(tid);
            hops += 1;
            debug_assert!(hops <= self.threads.len(), "donation chain loops at {tid}");
        }
    }

    /// Push `value` up the holder chain while it raises something.
    ///
    /// Only valid when the aggregate is a maximum and `value` comes from a
    /// donor whose effective priority did not decrease.
    fn update_effective_priority(&mut self, tid: Tid, value: u32) {
        let mut next = Some(tid);
        while let Some(tid) = next.take() {
            let state = self.state_mut(tid);
            if value <= state.effective_priority {
                break;
            }
            let old = core::mem::replace(&mut state.effective_priority, value);
            self.trace_donation(tid, old, value);
            next = self.donee(tid);
        }
    }

    /// `holder` gained a donor worth `value` (or one of its donors rose to
    /// `value`).
    fn donate(&mut self, holder: Tid, value: u32) {
        if P::MONOTONIC {
            self.update_effective_priority(holder, value);
        } else {
            self.propagate(holder);
        }
    }

    fn grant(&mut self, queue: WaitQueue, tid: Tid) {
        self.queue_mut(queue).holder = Some(tid);
        let state = self.state_mut(tid);
        state.waiting_on = None;
        state.held.push(queue);
        self.propagate(tid);
    }

    fn release(&mut self, queue: WaitQueue, holder: Tid) {
        self.queue_mut(queue).holder = None;
        if let Some(state) = self.threads.get_mut(&holder) {
            state.held.retain(|q| *q != queue);
        }
        self.propagate(holder);
    }

    fn waiter_views(&self, queue: WaitQueue) -> Vec<Waiter> {
        self.queue(queue)
            .waiters
            .iter()
            .map(|tid| {
                let state = self.threads.get(tid);
                Waiter {
                    tid: *tid,
                    effective_priority: state.map_or(P::PRIORITY_DEFAULT, |s| s.effective_priority),
                    enqueued_at: state.map_or(Timestamp::default(), |s| s.enqueued_at),
                }
            })
            .collect()
    }

    fn assert_no_cycle(&self, queue: WaitQueue, tid: Tid) {
        let mut holder = self.queue(queue).holder;
        while let Some(h) = holder {
            assert!(
                h != tid,
                "{tid} waiting on {queue} deadlocks: {tid} holds a queue earlier in the chain"
            );
            holder = self
                .threads
                .get(&h)
                .and_then(|s| s.waiting_on)
                .and_then(|q| self.queues[q.0].holder);
        }
    }

    fn trace_donation(&self, tid: Tid, old: u32, new: u32) {
        if self.trace.contains(TraceFlags::DONATE) {
            debug!("{}: effective priority of {tid}: {old} -> {new}", P::NAME);
        }
    }

    /// Check every scheduling invariant, returning the first breach.
    ///
    /// - base priorities are within range;
    /// - every effective priority equals the policy's aggregate over the
    ///   thread's transfer-enabled held queues;
    /// - `waiting_on` and queue membership agree both ways;
    /// - holders and held queues agree both ways.
    pub fn verify(&self) -> Result<(), Violation> {
        for (tid, state) in self.threads.iter() {
            let tid = *tid;
            if !(P::PRIORITY_MINIMUM..=P::PRIORITY_MAXIMUM).contains(&state.priority) {
                return Err(Violation::PriorityOutOfRange {
                    tid,
                    priority: state.priority,
                });
            }
            let expected = self.calc_effective_priority(tid);
            if expected != state.effective_priority {
                return Err(Violation::EffectivePriority {
                    tid,
                    expected,
                    actual: state.effective_priority,
                });
            }
            if let Some(queue) = state.waiting_on {
                if self.queue(queue).position(tid).is_none() {
                    return Err(Violation::NotEnqueued { tid, queue });
                }
            }
            for queue in state.held.iter() {
                let holder = self.queue(*queue).holder;
                if holder != Some(tid) {
                    return Err(Violation::Holder {
                        queue: *queue,
                        expected: Some(tid),
                        actual: holder,
                    });
                }
            }
        }
        for (idx, q) in self.queues.iter().enumerate() {
            let queue = WaitQueue(idx);
            for tid in q.waiters.iter() {
                if self.waiting_on(*tid) != Some(queue) {
                    return Err(Violation::StrayWaiter { tid: *tid, queue });
                }
            }
            if let Some(holder) = q.holder {
                let holds = self
                    .threads
                    .get(&holder)
                    .is_some_and(|s| s.held.contains(&queue));
                if !holds {
                    return Err(Violation::Holder {
                        queue,
                        expected: None,
                        actual: Some(holder),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<P: DonationPolicy> Scheduler for DonationScheduler<P> {
    fn policy_name(&self) -> &'static str {
        P::NAME
    }

    fn priority_range(&self) -> (u32, u32) {
        (P::PRIORITY_MINIMUM, P::PRIORITY_MAXIMUM)
    }

    fn new_wait_queue(&mut self, transfer_priority: bool) -> WaitQueue {
        self.queues.push(WaitQueueState::new(transfer_priority));
        WaitQueue(self.queues.len() - 1)
    }

    fn wait_for_access(&mut self, _guard: &InterruptGuard, queue: WaitQueue, tid: Tid) {
        if let Some(other) = self.waiting_on(tid) {
            panic!("{tid} already waits on {other}");
        }
        self.assert_no_cycle(queue, tid);

        let enqueued_at = self.stamp();
        let state = self.state_mut(tid);
        state.waiting_on = Some(queue);
        state.enqueued_at = enqueued_at;
        let effective = state.effective_priority;

        let q = self.queue_mut(queue);
        q.waiters.push(tid);
        let (transfer_priority, holder) = (q.transfer_priority, q.holder);

        if self.trace.contains(TraceFlags::ENQUEUE) {
            debug!("{}: {tid} waits on {queue} (effective {effective})", P::NAME);
        }
        if P::DONATES && transfer_priority {
            if let Some(holder) = holder {
                self.donate(holder, effective);
            }
        }
    }

    fn acquire(&mut self, _guard: &InterruptGuard, queue: WaitQueue, tid: Tid) {
        let waiting = self.queue(queue).waiters.len();
        assert!(
            waiting == 0,
            "{tid} acquires {queue} while {waiting} thread(s) still wait on it"
        );
        if let Some(other) = self.waiting_on(tid) {
            panic!("{tid} cannot acquire {queue} while waiting on {other}");
        }
        if !P::DONATES {
            return;
        }
        match self.queue(queue).holder {
            Some(holder) if holder == tid => return,
            Some(holder) => self.release(queue, holder),
            None => (),
        }
        self.grant(queue, tid);
    }

    fn next_thread(&mut self, _guard: &InterruptGuard, queue: WaitQueue) -> Option<Tid> {
        if let Some(holder) = self.queue(queue).holder {
            self.release(queue, holder);
        }
        let waiters = self.waiter_views(queue);
        let idx = self.policy.select(&waiters)?;
        let tid = self.queue_mut(queue).waiters.remove(idx);
        self.state_mut(tid).waiting_on = None;
        if self.trace.contains(TraceFlags::DISPATCH) {
            debug!(
                "{}: {queue} -> {tid} (effective {}, {} left)",
                P::NAME,
                waiters[idx].effective_priority,
                waiters.len() - 1
            );
        }
        if P::DONATES {
            self.grant(queue, tid);
        }
        Some(tid)
    }

    fn peek_next_thread(&mut self, _guard: &InterruptGuard, queue: WaitQueue) -> Option<Tid> {
        let waiters = self.waiter_views(queue);
        self.policy.select(&waiters).map(|idx| waiters[idx].tid)
    }

    fn remove(
        &mut self,
        _guard: &InterruptGuard,
        queue: WaitQueue,
        tid: Tid,
    ) -> Result<(), KernelError> {
        let q = self.queue_mut(queue);
        let idx = q.position(tid).ok_or(KernelError::NoSuchEntry)?;
        q.waiters.remove(idx);
        let (transfer_priority, holder) = (q.transfer_priority, q.holder);
        self.state_mut(tid).waiting_on = None;
        if self.trace.contains(TraceFlags::ENQUEUE) {
            debug!("{}: {tid} removed from {queue}", P::NAME);
        }
        if P::DONATES && transfer_priority {
            if let Some(holder) = holder {
                self.propagate(holder);
            }
        }
        Ok(())
    }

    fn get_priority(&self, tid: Tid) -> u32 {
        self.threads
            .get(&tid)
            .map_or(P::PRIORITY_DEFAULT, |s| s.priority)
    }

    fn get_effective_priority(&self, tid: Tid) -> u32 {
        self.effective_of(tid)
    }

    fn set_priority(&mut self, _guard: &InterruptGuard, tid: Tid, priority: u32) {
        assert!(
            (P::PRIORITY_MINIMUM..=P::PRIORITY_MAXIMUM).contains(&priority),
            "priority {priority} of {tid} is out of [{}, {}]",
            P::PRIORITY_MINIMUM,
            P::PRIORITY_MAXIMUM
        );
        let state = self.state_mut(tid);
        if state.priority == priority {
            return;
        }
        let old = core::mem::replace(&mut state.priority, priority);
        if self.trace.contains(TraceFlags::PRIORITY) {
            debug!("{}: priority of {tid}: {old} -> {priority}", P::NAME);
        }
        if P::MONOTONIC && priority > old {
            self.update_effective_priority(tid, priority);
        } else {
            self.propagate(tid);
        }
    }

    fn holder(&self, queue: WaitQueue) -> Option<Tid> {
        self.queue(queue).holder
    }

    fn waiters(&self, queue: WaitQueue) -> Vec<Tid> {
        self.queue(queue).waiters.clone()
    }

    fn transfers_priority(&self, queue: WaitQueue) -> bool {
        self.queue(queue).transfer_priority
    }

    fn waiting_on(&self, tid: Tid) -> Option<WaitQueue> {
        self.threads.get(&tid).and_then(|s| s.waiting_on)
    }

    fn held_queues(&self, tid: Tid) -> Vec<WaitQueue> {
        self.threads
            .get(&tid)
            .map_or_else(Vec::new, |s| s.held.clone())
    }

    fn detach_thread(&mut self, _guard: &InterruptGuard, tid: Tid) -> Result<(), KernelError> {
        match self.threads.get(&tid) {
            Some(state) if !state.is_detached() => Err(KernelError::Busy),
            Some(_) => {
                self.threads.remove(&tid);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

static SCHEDULER: SpinLock<Option<Box<dyn Scheduler + Send>>> = SpinLock::new(None);

/// Set the scheduler of the kernel, returning the previous one.
pub fn set_scheduler(
    scheduler: impl Scheduler + Send + 'static,
) -> Option<Box<dyn Scheduler + Send>> {
    set_boxed_scheduler(Box::new(scheduler))
}

/// Set an already boxed scheduler, returning the previous one.
pub fn set_boxed_scheduler(
    scheduler: Box<dyn Scheduler + Send>,
) -> Option<Box<dyn Scheduler + Send>> {
    let mut guard = SCHEDULER.lock();
    let prev = guard.replace(scheduler);
    guard.unlock();
    prev
}

/// Run `f` on the kernel scheduler with interrupts disabled.
///
/// A [`Fifo`] scheduler is installed if none has been set.
pub fn with_scheduler<R>(f: impl FnOnce(&mut dyn Scheduler, &InterruptGuard) -> R) -> R {
    let mut guard = SCHEDULER.lock();
    let token = InterruptGuard::new();
    let scheduler = guard.get_or_insert_with(|| {
        info!("Scheduler: none installed, falling back to fifo.");
        let fifo: Box<dyn Scheduler + Send> = Box::new(DonationScheduler::new(Fifo));
        fifo
    });
    let result = f(scheduler.as_mut(), &token);
    drop(token);
    guard.unlock();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::policy::{Lottery, Priority};

    #[test]
    fn global_scheduler_falls_back_to_fifo() {
        let name = with_scheduler(|sched, _| sched.policy_name());
        assert_eq!(name, "fifo");

        let prev = set_scheduler(DonationScheduler::new(Priority));
        assert_eq!(prev.map(|s| s.policy_name()), Some("fifo"));

        let effective = with_scheduler(|sched, guard| {
            let q = sched.new_wait_queue(true);
            sched.acquire(guard, q, Tid(1));
            sched.set_priority(guard, Tid(2), 6);
            sched.wait_for_access(guard, q, Tid(2));
            sched.get_effective_priority(Tid(1))
        });
        assert_eq!(effective, 6);
    }

    #[test]
    fn unseen_thread_reports_default() {
        let sched = DonationScheduler::new(Lottery::new(0));
        assert_eq!(sched.get_priority(Tid(9)), 1);
        assert_eq!(sched.get_effective_priority(Tid(9)), 1);
        assert_eq!(sched.thread_count(), 0);
    }

    #[test]
    fn acquire_replaces_previous_holder() {
        let guard = InterruptGuard::new();
        let mut sched = DonationScheduler::new(Priority);
        let (a, b) = (Tid(1), Tid(2));
        let q = sched.new_wait_queue(true);
        sched.acquire(&guard, q, a);
        sched.acquire(&guard, q, b);
        assert_eq!(sched.holder(q), Some(b));
        assert!(sched.held_queues(a).is_empty());
        sched.verify().unwrap();
    }

    #[test]
    #[should_panic(expected = "already waits on")]
    fn double_wait_is_fatal() {
        let guard = InterruptGuard::new();
        let mut sched = DonationScheduler::new(Priority);
        let (q1, q2) = (sched.new_wait_queue(true), sched.new_wait_queue(true));
        sched.wait_for_access(&guard, q1, Tid(1));
        sched.wait_for_access(&guard, q2, Tid(1));
    }

    #[test]
    #[should_panic(expected = "deadlocks")]
    fn waiting_on_own_chain_is_fatal() {
        let guard = InterruptGuard::new();
        let mut sched = DonationScheduler::new(Lottery::new(1));
        let (q1, q2) = (sched.new_wait_queue(true), sched.new_wait_queue(true));
        let (a, b) = (Tid(1), Tid(2));
        sched.acquire(&guard, q1, a);
        sched.acquire(&guard, q2, b);
        sched.wait_for_access(&guard, q1, b);
        sched.wait_for_access(&guard, q2, a);
    }
}
