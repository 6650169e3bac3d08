//! Synchronization primitives for green threads
//!
//! Mutex, semaphore and barrier wait by yielding in a loop; only the
//! condition variable parks its waiters. All state is kept in atomics so a
//! quantum expiring in the middle of an update cannot tear it.
//!
//! A thread holding a [`Mutex`] cannot yield, so a spin that would need
//! another thread to make progress fails with `Deadlock` instead of
//! spinning forever.

mod barrier;
mod condvar;
mod mutex;
mod semaphore;

pub use barrier::Barrier;
pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;

use uthread_core::{Error, Result};

use crate::scheduler;

/// Give the CPU away once while waiting for another thread
pub(crate) fn spin_wait() -> Result<()> {
    if scheduler::holds_lock() {
        return Err(Error::Deadlock);
    }
    scheduler::yield_now();
    Ok(())
}
