//! A "scope guard" that marks a command as in flight until it goes out of scope.

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds a port's in-flight flag.
///
/// The flag is set when the guard is acquired and cleared when it is dropped,
/// so every exit path (success, error, timeout, panic) releases it.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
	flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
	/// Set the flag and return a guard, or `None` if it was already set.
	pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
			.ok()
			.map(|_| InFlightGuard { flag })
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::Release);
	}
}
