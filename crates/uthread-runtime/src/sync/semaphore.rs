//! Counting semaphore bounded by a maximum value

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use uthread_core::{Error, Result};

use super::spin_wait;

#[derive(Debug)]
pub struct Semaphore {
    count: AtomicU32,
    max: u32,
    destroyed: AtomicBool,
    /// Threads inside `wait`; `destroy` lets them drain
    waiters: AtomicU32,
}

impl Semaphore {
    /// Semaphore starting at `initial`, capped at `initial` (at least 1)
    pub fn new(initial: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            max: initial.max(1),
            destroyed: AtomicBool::new(false),
            waiters: AtomicU32::new(0),
        }
    }

    /// Semaphore with an explicit cap
    pub fn with_max(initial: u32, max: u32) -> Result<Self> {
        if max == 0 {
            return Err(Error::InvalidArgument("semaphore maximum must be positive"));
        }
        if initial > max {
            return Err(Error::InvalidArgument("semaphore initial value exceeds maximum"));
        }
        Ok(Self {
            count: AtomicU32::new(initial),
            max,
            destroyed: AtomicBool::new(false),
            waiters: AtomicU32::new(0),
        })
    }

    /// Take one unit, yielding while none is available
    ///
    /// Fails with `Destroyed` if the semaphore is destroyed before a unit
    /// could be taken.
    pub fn wait(&self) -> Result<()> {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        let res = self.wait_inner();
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        res
    }

    fn wait_inner(&self) -> Result<()> {
        loop {
            if self.try_wait()? {
                return Ok(());
            }
            spin_wait()?;
        }
    }

    /// Take one unit if available without yielding
    pub fn try_wait(&self) -> Result<bool> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::Destroyed);
        }
        let taken = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            .is_ok();
        Ok(taken)
    }

    /// Return one unit; a no-op when already at the maximum
    pub fn post(&self) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::Destroyed);
        }
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| (c < self.max).then_some(c + 1));
        Ok(())
    }

    /// Mark destroyed and yield until every waiter has left
    ///
    /// Fails with `Deadlock` if waiters remain and the caller holds a mutex;
    /// the semaphore stays destroyed and the waiters drain once they run.
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(Error::Destroyed);
        }
        while self.waiters.load(Ordering::Acquire) > 0 {
            spin_wait()?;
        }
        Ok(())
    }

    /// Units currently available
    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
