use keos_sched::{
    Policy, SystemConfigurationBuilder, Tid, TraceFlags, debugging::dump_queue, with_scheduler,
};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<String>>);

impl core::fmt::Write for Capture {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.lock().unwrap().push_str(s);
        Ok(())
    }
}

impl Capture {
    fn take(&self) -> String {
        core::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Tests booting the kernel scheduler from the command line.
///
/// The kernel scheduler and the console are machine-wide, so this is the
/// only test of this file. This test ensures that:
/// - The command line selects the policy installed as the kernel scheduler.
/// - Traced events and queue dumps reach the console.
/// - `quiet` silences the console.
#[test]
fn boot() {
    let console = Capture::default();
    abyss::kprint::set_console(console.clone());

    let conf = SystemConfigurationBuilder::new()
        .parse_cmdline("console=ttyS0 sched=priority trace=donate,dispatch")
        .unwrap();
    assert!(console.take().contains("[WARN] Config: ignoring unknown option `console=ttyS0`."));
    assert_eq!(conf.policy(), Policy::Priority);
    assert_eq!(conf.trace(), TraceFlags::DONATE | TraceFlags::DISPATCH);

    assert!(conf.install().is_none());
    assert!(console.take().contains("[INFO] Scheduler: priority"));

    let (a, b) = (Tid(1), Tid(2));
    let q = with_scheduler(|sched, guard| {
        assert_eq!(sched.policy_name(), "priority");
        let q = sched.new_wait_queue(true);
        sched.acquire(guard, q, a);
        sched.set_priority(guard, b, 7);
        sched.wait_for_access(guard, q, b);
        assert_eq!(sched.get_effective_priority(a), 7);
        q
    });
    let log = console.take();
    assert!(log.contains("[DEBUG] priority: effective priority of tid#1: 1 -> 7"), "{log}");

    with_scheduler(|sched, _| dump_queue(sched, q));
    let log = console.take();
    assert!(log.contains("holder: Some(Tid(1))"), "{log}");
    assert!(log.contains("tid#2: priority 7, effective 7"), "{log}");

    with_scheduler(|sched, guard| assert_eq!(sched.next_thread(guard, q), Some(b)));
    assert!(console.take().contains("[DEBUG] priority: wq#"));

    let prev = SystemConfigurationBuilder::new()
        .set_policy(Policy::Lottery)
        .set_seed(3)
        .set_quiet(true)
        .install();
    assert_eq!(prev.map(|s| s.policy_name()), Some("priority"));
    with_scheduler(|sched, guard| {
        assert_eq!(sched.priority_range(), (1, 7));
        let q = sched.new_wait_queue(true);
        sched.acquire(guard, q, a);
        dump_queue(sched, q);
    });
    assert_eq!(console.take(), "");

    abyss::QUIET.store(false, core::sync::atomic::Ordering::SeqCst);
    abyss::kprint::take_console();
}
