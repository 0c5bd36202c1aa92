//! Kernel print utilities.
//!
//! Output goes to whatever console sink has been installed with
//! [`set_console`]. Until one is installed, output is dropped, except with
//! the `std` feature where the machine console is the host's stderr.

use crate::spinlock::SpinLock;
use alloc::boxed::Box;
use core::fmt::Write;

type Console = Box<dyn Write + Send>;

static CONSOLE: SpinLock<Option<Console>> = SpinLock::new(None);

#[cfg(feature = "std")]
struct Stderr;

#[cfg(feature = "std")]
impl Write for Stderr {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        use std::io::Write as _;
        std::io::stderr()
            .write_all(s.as_bytes())
            .map_err(|_| core::fmt::Error)
    }
}

/// Installs the console sink, returning the previous one.
pub fn set_console(console: impl Write + Send + 'static) -> Option<Box<dyn Write + Send>> {
    let mut guard = CONSOLE.lock();
    let prev = guard.replace(Box::new(console));
    guard.unlock();
    prev
}

/// Removes the console sink.
pub fn take_console() -> Option<Box<dyn Write + Send>> {
    let mut guard = CONSOLE.lock();
    let prev = guard.take();
    guard.unlock();
    prev
}

#[doc(hidden)]
pub fn _print(fmt: core::fmt::Arguments<'_>) {
    let mut guard = CONSOLE.lock();
    match guard.as_mut() {
        Some(console) => {
            let _ = console.write_fmt(fmt);
        }
        #[cfg(feature = "std")]
        None => {
            let _ = Stderr.write_fmt(fmt);
        }
        #[cfg(not(feature = "std"))]
        None => {}
    }
    guard.unlock();
}

/// Prints out the message.
///
/// Use the format! syntax to write data to the console.
/// This first holds the lock for console device.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// Prints out the message with a newline.
///
/// Use the format! syntax to write data to the console.
/// This first holds the lock for console device.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Display an information message.
#[macro_export]
macro_rules! info {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO] {}\n", format_args!($($arg)*)) });
}

/// Display a warning message.
#[macro_export]
macro_rules! warning {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN] {}\n", format_args!($($arg)*)) });
}

/// Display a debug message.
#[macro_export]
macro_rules! debug {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG] {}\n", format_args!($($arg)*))} );
}
