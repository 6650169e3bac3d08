//! Stack memory for green threads
//!
//! Each green thread owns one anonymous mapping. With guard pages enabled the
//! lowest page of the mapping is left PROT_NONE, so running off the bottom of
//! the stack faults instead of silently corrupting a neighbour.
//!
//! ```text
//!   low addr                                         high addr
//!   +-------------+----------------------------------+
//!   | guard page  |        usable stack  <- grows down | top
//!   +-------------+----------------------------------+
//! ```
//!
//! Stacks are not registered with memory checkers (valgrind's
//! `VALGRIND_STACK_REGISTER` client request). Under valgrind, switches onto
//! a green stack can be reported as large stack pointer changes; run with
//! `--max-stackframe` raised above the configured stack size.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
    } else {
        compile_error!("uthread stacks require a unix mmap");
    }
}

use std::ops::Range;

use uthread_core::constants::PAGE_SIZE;

/// An exclusively owned stack mapping, unmapped on drop
#[derive(Debug)]
pub struct Stack {
    /// Start of the mapping (the guard page when present)
    base: *mut u8,
    /// Length of the whole mapping including the guard
    len: usize,
    /// Bytes of guard at the bottom (0 or PAGE_SIZE)
    guard: usize,
}

impl Stack {
    /// Highest address of the stack; the initial stack pointer
    #[inline]
    pub fn top(&self) -> *mut u8 {
        // In bounds: one past the end of the mapping
        self.base.wrapping_add(self.len)
    }

    /// Lowest usable address
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        self.base.wrapping_add(self.guard)
    }

    /// Usable bytes (excluding the guard)
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.len - self.guard
    }

    /// Address range of the guard page, if any
    pub fn guard_range(&self) -> Option<Range<usize>> {
        (self.guard > 0).then(|| {
            let start = self.base as usize;
            start..start + self.guard
        })
    }
}

/// Round up to a whole number of pages
#[inline]
pub const fn page_round_up(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_round_up() {
        assert_eq!(page_round_up(1), PAGE_SIZE);
        assert_eq!(page_round_up(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(page_round_up(PAGE_SIZE + 1), 2 * PAGE_SIZE);
        assert_eq!(page_round_up(0), 0);
    }

    #[test]
    fn test_stack_with_guard() {
        let stack = Stack::allocate(64 * 1024, true).unwrap();
        assert_eq!(stack.usable_size(), 64 * 1024);
        let guard = stack.guard_range().unwrap();
        assert_eq!(guard.end - guard.start, PAGE_SIZE);
        assert_eq!(guard.end, stack.bottom() as usize);
        assert!(!guard.contains(&(stack.bottom() as usize)));

        // The whole usable range is writable
        unsafe {
            stack.bottom().write(0xAA);
            stack.top().sub(1).write(0x55);
            assert_eq!(stack.bottom().read(), 0xAA);
        }
    }

    #[test]
    fn test_stack_without_guard() {
        let stack = Stack::allocate(20_000, false).unwrap();
        assert!(stack.guard_range().is_none());
        assert_eq!(stack.usable_size(), page_round_up(20_000));
        assert_eq!(stack.bottom(), stack.base);
    }
}
