//! Unix stack implementation using mmap

use super::{page_round_up, Stack};
use uthread_core::constants::PAGE_SIZE;
use uthread_core::{kerror, Error, Result};

impl Stack {
    /// Map a new stack of at least `size` usable bytes
    ///
    /// With `guard` set one extra page is mapped below the stack and made
    /// inaccessible.
    pub fn allocate(size: usize, guard: bool) -> Result<Stack> {
        let usable = page_round_up(size);
        let guard = if guard { PAGE_SIZE } else { 0 };
        let len = usable
            .checked_add(guard)
            .ok_or(Error::ResourceExhausted("stack size overflow"))?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(Error::ResourceExhausted("stack mmap failed"));
        }

        let stack = Stack {
            base: base as *mut u8,
            len,
            guard,
        };

        if guard > 0 {
            let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
            if ret != 0 {
                // `stack` unmaps on drop
                return Err(Error::Platform(last_errno()));
            }
        }

        Ok(stack)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base as *mut libc::c_void, self.len) };
        if ret != 0 {
            kerror!("munmap of stack at {:p} failed: errno {}", self.base, last_errno());
        }
    }
}

pub(crate) fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
