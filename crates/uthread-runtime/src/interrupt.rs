//! Software interrupt mask
//!
//! The quantum timer is delivered as a real POSIX signal, but it must never
//! switch threads while the scheduler is halfway through mutating its queues.
//! Instead of blocking the signal we keep a per-OS-thread mask depth:
//!
//! - `disable()` bumps the depth and returns a guard that restores it
//! - the timer handler only preempts at depth 0; otherwise it leaves a
//!   pending flag
//! - dropping the last guard services a pending preemption
//!
//! Every context transfer happens at depth exactly 1, so the depth seen by
//! the resumed thread is consistent with the one it suspended at.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
    static PENDING: Cell<bool> = const { Cell::new(false) };
}

/// Keeps preemption masked while alive
#[must_use]
pub struct MaskGuard {
    _not_send: PhantomData<*const ()>,
}

/// Mask preemption until the returned guard is dropped
#[inline]
pub fn disable() -> MaskGuard {
    DEPTH.with(|d| d.set(d.get() + 1));
    MaskGuard {
        _not_send: PhantomData,
    }
}

impl Drop for MaskGuard {
    #[inline]
    fn drop(&mut self) {
        enable();
    }
}

/// Drop one level of masking, servicing a deferred preemption at depth 0
pub(crate) fn enable() {
    let depth = DEPTH.with(|d| {
        let v = d.get().saturating_sub(1);
        d.set(v);
        v
    });
    if depth == 0 && PENDING.with(|p| p.replace(false)) {
        crate::scheduler::preempt_current();
    }
}

/// Check whether scheduler-critical code is running
#[inline]
pub fn is_masked() -> bool {
    DEPTH.with(|d| d.get()) > 0
}

/// Current mask depth
#[inline]
pub(crate) fn depth() -> u32 {
    DEPTH.with(|d| d.get())
}

/// Note a preemption that arrived while masked
#[inline]
pub(crate) fn defer_preemption() {
    PENDING.with(|p| p.set(true));
}
