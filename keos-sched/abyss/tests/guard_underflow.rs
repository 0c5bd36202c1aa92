use abyss::interrupt::InterruptGuard;

/// Tests that an unbalanced guard drop is caught.
///
/// The failed drop leaves the nesting depth broken for the whole machine, so
/// this is the only test of this file. This test ensures that:
/// - Dropping more guards than were taken panics.
#[test]
#[should_panic(expected = "dropped more often than taken")]
fn guard_underflow() {
    let guard = InterruptGuard::new();
    let twin = unsafe { core::ptr::read(&guard) };
    drop(guard);
    drop(twin);
}
