//! Execution contexts
//!
//! A [`Context`] pairs the saved machine registers of a green thread with the
//! stack they point into. This is the only place that calls into the
//! architecture switch routine; everything above it moves opaque contexts
//! around.

use crate::arch::{self, EntryFn, MachineContext};
use crate::memory::Stack;
use std::ops::Range;
use uthread_core::Result;

/// Saved execution state plus the stack it runs on
#[derive(Debug)]
pub struct Context {
    regs: MachineContext,
    /// `None` for the bootstrap context, which runs on the OS thread's stack
    stack: Option<Stack>,
}

impl Context {
    /// Context for the code already running on the OS thread
    ///
    /// Its registers are filled in by the first switch away from it.
    pub fn bootstrap() -> Self {
        Self {
            regs: MachineContext::default(),
            stack: None,
        }
    }

    /// Allocate a stack and prime a context that calls `entry(arg)` on it
    pub fn allocate(stack_size: usize, guard_page: bool, entry: EntryFn, arg: usize) -> Result<Self> {
        let stack = Stack::allocate(stack_size, guard_page)?;
        let mut regs = MachineContext::default();
        arch::init_context(&mut regs, stack.top(), entry, arg);
        Ok(Self {
            regs,
            stack: Some(stack),
        })
    }

    /// Guard page of this context's stack
    pub fn guard_range(&self) -> Option<Range<usize>> {
        self.stack.as_ref().and_then(Stack::guard_range)
    }

    /// Stable pointer to the register block
    ///
    /// Contexts live inside boxed thread records, so the pointer stays valid
    /// until that record is freed.
    #[inline]
    pub(crate) fn regs_ptr(&mut self) -> *mut MachineContext {
        &mut self.regs
    }
}

/// A context transfer computed under the runtime borrow and performed after it
#[must_use]
#[derive(Debug)]
pub(crate) struct Transfer {
    pub from: *mut MachineContext,
    pub to: *const MachineContext,
}

impl Transfer {
    /// Suspend the caller into `from` and resume `to`
    ///
    /// # Safety
    ///
    /// Both contexts must still be owned by live thread records, and no
    /// reference into the runtime may be held across the call.
    #[inline]
    pub(crate) unsafe fn perform(self) {
        arch::switch_context(self.from, self.to);
    }
}
