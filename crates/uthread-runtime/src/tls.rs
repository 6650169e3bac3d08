//! Thread-local storage for the per-OS-thread runtime
//!
//! Every OS thread that touches uthread gets its own [`Runtime`]. It is
//! reached through a raw pointer in a const thread-local so the signal
//! handlers can read it without lazy initialization, and released by a
//! second thread-local whose destructor runs when the OS thread exits.

use std::cell::Cell;
use std::ops::Range;
use std::ptr;

use crate::scheduler::Runtime;

thread_local! {
    /// Runtime owned by this OS thread, null until first use
    static RUNTIME: Cell<*mut Runtime> = const { Cell::new(ptr::null_mut()) };

    /// Frees RUNTIME when the OS thread exits
    static OWNER: RuntimeOwner = const { RuntimeOwner };

    /// Guard page of the running green thread, empty for the bootstrap thread
    static GUARD: Cell<(usize, usize)> = const { Cell::new((0, 0)) };
}

struct RuntimeOwner;

impl Drop for RuntimeOwner {
    fn drop(&mut self) {
        let rt = RUNTIME.with(|cell| cell.replace(ptr::null_mut()));
        if !rt.is_null() {
            // SAFETY: produced by Box::into_raw in `install` and cleared above
            let rt = unsafe { Box::from_raw(rt) };
            rt.teardown();
        }
    }
}

/// Hand ownership of a runtime to this OS thread
pub(crate) fn install(rt: Box<Runtime>) -> *mut Runtime {
    // Registers the destructor; fails only while the thread is already exiting
    let _ = OWNER.try_with(|_| ());
    let raw = Box::into_raw(rt);
    RUNTIME.with(|cell| cell.set(raw));
    raw
}

/// Pointer to this OS thread's runtime, null if none was created
#[inline]
pub(crate) fn runtime_ptr() -> *mut Runtime {
    RUNTIME.with(|cell| cell.get())
}

/// Check if a runtime exists on this OS thread
#[inline]
pub fn has_runtime() -> bool {
    !runtime_ptr().is_null()
}

/// Forget the runtime without freeing it
///
/// Used right before the process exits from a green thread's stack, where
/// freeing stacks would pull the floor out from under the caller.
pub(crate) fn abandon() {
    RUNTIME.with(|cell| cell.set(ptr::null_mut()));
}

/// Record the guard page of the thread about to run
#[inline]
pub(crate) fn set_current_guard(range: Option<Range<usize>>) {
    let raw = range.map_or((0, 0), |r| (r.start, r.end));
    GUARD.with(|cell| cell.set(raw));
}

/// Check whether `addr` falls in the running thread's guard page
#[inline]
pub(crate) fn in_current_guard(addr: usize) -> bool {
    let (start, end) = GUARD.with(|cell| cell.get());
    start <= addr && addr < end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_lookup() {
        assert!(!in_current_guard(0));
        set_current_guard(Some(0x1000..0x2000));
        assert!(in_current_guard(0x1000));
        assert!(in_current_guard(0x1FFF));
        assert!(!in_current_guard(0x2000));
        set_current_guard(None);
        assert!(!in_current_guard(0x1000));
    }
}
