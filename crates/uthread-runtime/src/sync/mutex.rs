//! Green-thread mutex
//!
//! Contended `lock` yields to the scheduler until the owner releases. While
//! held, the owner is marked as being in a critical section: its voluntary
//! yields become no-ops and the quantum timer leaves it alone.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use uthread_core::{kwarn, Error, Result, ThreadId};

use super::spin_wait;
use crate::{interrupt, scheduler};

const UNLOCKED: u64 = u64::MAX;

/// A mutex that yields when contended
///
/// ```ignore
/// let m = Mutex::new(0);
/// {
///     let mut guard = m.lock()?;
///     *guard += 1;
/// } // unlocked here
/// ```
pub struct Mutex<T> {
    /// Id of the owning thread, `UNLOCKED` when free
    owner: AtomicU64,
    data: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            owner: AtomicU64::new(UNLOCKED),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, yielding while another thread holds it
    ///
    /// Fails with `Deadlock` if the caller already holds this mutex, or
    /// holds another one and would have to wait.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        loop {
            if self.try_acquire()? {
                return Ok(MutexGuard { mutex: self });
            }
            spin_wait()?;
        }
    }

    /// Acquire the lock only if it is free
    pub fn try_lock(&self) -> Result<Option<MutexGuard<'_, T>>> {
        Ok(self.try_acquire()?.then(|| MutexGuard { mutex: self }))
    }

    fn try_acquire(&self) -> Result<bool> {
        let _mask = interrupt::disable();
        let me = scheduler::current_id().as_u64();
        match self
            .owner
            .compare_exchange(UNLOCKED, me, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => {
                scheduler::enter_critical();
                Ok(true)
            }
            Err(owner) if owner == me => Err(Error::Deadlock),
            Err(_) => Ok(false),
        }
    }

    fn release(&self) -> Result<()> {
        let _mask = interrupt::disable();
        let me = scheduler::current_id().as_u64();
        self.owner
            .compare_exchange(me, UNLOCKED, Ordering::Release, Ordering::Relaxed)
            .map_err(|_| Error::InvalidArgument("mutex not held by the calling thread"))?;
        scheduler::leave_critical();
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Thread currently holding the lock
    pub fn owner(&self) -> Option<ThreadId> {
        match self.owner.load(Ordering::Relaxed) {
            UNLOCKED => None,
            id => Some(ThreadId::new(id)),
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("owner", &self.owner()).finish_non_exhaustive()
    }
}

/// Access to the data of a locked [`Mutex`]; unlocks on drop
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> MutexGuard<'a, T> {
    /// Release the lock, reporting a release by a thread that does not own it
    pub fn unlock(self) -> Result<()> {
        let mutex = self.mutex;
        std::mem::forget(self);
        mutex.release()
    }

    /// Release and hand back the mutex for relocking after a condition wait
    pub(crate) fn unlock_for_wait(self) -> Result<&'a Mutex<T>> {
        let mutex = self.mutex;
        std::mem::forget(self);
        mutex.release()?;
        Ok(mutex)
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.mutex.release() {
            kwarn!("mutex guard dropped by a non-owner: {}", e);
        }
    }
}
