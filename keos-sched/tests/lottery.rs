use keos_sched::{
    DonationScheduler, InterruptGuard, Scheduler, Tid,
    thread::policy::Lottery,
};

const SEED: u64 = 0x6b65_6f73;

fn scheduler() -> DonationScheduler<Lottery> {
    DonationScheduler::new(Lottery::new(SEED))
}

/// Tests the ticket transfer through a lock.
///
/// This test ensures that:
/// - A holder owns its own tickets plus the tickets of every waiter.
/// - Tickets are transferred transitively through a chain of holders.
/// - Handing the queue over gives the tickets back.
#[test]
fn tickets_add_up() {
    let guard = InterruptGuard::new();
    let mut sched = scheduler();
    let (top, middle, w1, w2) = (Tid(1), Tid(2), Tid(3), Tid(4));
    let outer = sched.new_wait_queue(true);
    let inner = sched.new_wait_queue(true);

    sched.set_priority(&guard, top, 2);
    sched.set_priority(&guard, middle, 3);
    sched.set_priority(&guard, w1, 4);
    sched.set_priority(&guard, w2, 5);
    sched.acquire(&guard, outer, top);
    sched.acquire(&guard, inner, middle);

    sched.wait_for_access(&guard, outer, middle);
    assert_eq!(sched.get_effective_priority(top), 2 + 3);
    sched.wait_for_access(&guard, inner, w1);
    sched.wait_for_access(&guard, inner, w2);
    assert_eq!(sched.get_effective_priority(middle), 3 + 4 + 5);
    assert_eq!(sched.get_effective_priority(top), 2 + 3 + 4 + 5);
    sched.verify().unwrap();

    sched.set_priority(&guard, w1, 1);
    assert_eq!(sched.get_effective_priority(top), 2 + 3 + 1 + 5);
    sched.verify().unwrap();

    assert_eq!(sched.next_thread(&guard, outer), Some(middle));
    assert_eq!(sched.get_effective_priority(top), 2);
    assert_eq!(sched.get_effective_priority(middle), 3 + 1 + 5);
    sched.verify().unwrap();
}

/// Tests a lottery queue that does not transfer tickets.
///
/// This test ensures that:
/// - The holder keeps exactly its own tickets.
#[test]
fn no_transfer() {
    let guard = InterruptGuard::new();
    let mut sched = scheduler();
    let q = sched.new_wait_queue(false);
    sched.acquire(&guard, q, Tid(1));
    for tid in 2..6 {
        sched.set_priority(&guard, Tid(tid), 7);
        sched.wait_for_access(&guard, q, Tid(tid));
    }
    assert_eq!(sched.get_effective_priority(Tid(1)), 1);
    sched.verify().unwrap();
}

/// Tests the distribution of the winners.
///
/// Waiters hold 1, 2 and 7 tickets. This test ensures that:
/// - Over 10000 draws the 7-ticket waiter wins about 70% of the time.
/// - The frequencies pass a chi-squared test against the ticket shares.
#[test]
fn distribution() {
    const DRAWS: usize = 10000;
    let guard = InterruptGuard::new();
    let mut sched = scheduler();
    let q = sched.new_wait_queue(true);
    let tickets = [1, 2, 7];
    for (i, t) in tickets.iter().enumerate() {
        sched.set_priority(&guard, Tid(i as u64), *t);
        sched.wait_for_access(&guard, q, Tid(i as u64));
    }

    let mut wins = [0usize; 3];
    for _ in 0..DRAWS {
        let tid = sched.peek_next_thread(&guard, q).unwrap();
        wins[tid.0 as usize] += 1;
    }
    assert!(
        (6700..=7300).contains(&wins[2]),
        "7-ticket waiter won {} times",
        wins[2]
    );

    // 2 degrees of freedom, p = 0.001.
    let chi_squared: f64 = tickets
        .iter()
        .zip(wins)
        .map(|(t, w)| {
            let expected = DRAWS as f64 * f64::from(*t) / 10.0;
            (w as f64 - expected).powi(2) / expected
        })
        .sum();
    assert!(chi_squared < 13.816, "chi-squared {chi_squared}, wins {wins:?}");
}

/// Tests that dispatch follows the lottery and keeps the queue consistent.
///
/// This test ensures that:
/// - Every waiter is eventually dispatched exactly once.
/// - The donation graph stays consistent after each dispatch.
#[test]
fn drain() {
    let guard = InterruptGuard::new();
    let mut sched = scheduler();
    let q = sched.new_wait_queue(true);
    sched.acquire(&guard, q, Tid(100));
    for tid in 0..20 {
        sched.set_priority(&guard, Tid(tid), (tid % 7 + 1) as u32);
        sched.wait_for_access(&guard, q, Tid(tid));
    }
    assert_eq!(
        sched.get_effective_priority(Tid(100)),
        1 + (0..20).map(|t| t % 7 + 1).sum::<u64>() as u32
    );

    let mut seen = Vec::new();
    while let Some(tid) = sched.next_thread(&guard, q) {
        assert_eq!(sched.holder(q), Some(tid));
        sched.verify().unwrap();
        seen.push(tid.0);
    }
    seen.sort();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

/// Tests the ticket range.
///
/// This test ensures that:
/// - A thread cannot be left without tickets.
#[test]
#[should_panic(expected = "out of [1, 7]")]
fn zero_tickets() {
    let guard = InterruptGuard::new();
    let mut sched = scheduler();
    assert!(!sched.decrease_priority(&guard, Tid(1)));
    sched.set_priority(&guard, Tid(1), 0);
}
