//! Guard page fault handling
//!
//! A green thread that runs off the bottom of its stack touches its PROT_NONE
//! guard page. The SIGSEGV/SIGBUS handler runs on an alternate signal stack
//! (the faulting stack is unusable), recognises the address as the running
//! thread's guard page and terminates that thread with a null value.
//!
//! Faults anywhere else are not ours: the previously installed action is put
//! back and the handler returns, so the faulting instruction re-executes
//! under it.

use std::ptr;
use std::sync::OnceLock;

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use uthread_core::{kerror, Error, Result};

use crate::memory::Stack;
use crate::{interrupt, scheduler, tls};

const ALT_STACK_SIZE: usize = 64 * 1024;

static PREV_SEGV: OnceLock<SigAction> = OnceLock::new();
static PREV_BUS: OnceLock<SigAction> = OnceLock::new();

/// Alternate signal stack for this OS thread, restored on drop
pub(crate) struct FaultGuard {
    _alt: Stack,
    previous: libc::stack_t,
}

impl FaultGuard {
    pub fn install() -> Result<Self> {
        install_handlers()?;

        let alt = Stack::allocate(ALT_STACK_SIZE, false)?;
        let stack = libc::stack_t {
            ss_sp: alt.bottom().cast(),
            ss_flags: 0,
            ss_size: alt.usable_size(),
        };
        // SAFETY: zeroed stack_t is a valid "no alternate stack" value
        let mut previous: libc::stack_t = unsafe { std::mem::zeroed() };
        if unsafe { libc::sigaltstack(&stack, &mut previous) } != 0 {
            return Err(Error::Platform(Errno::last_raw()));
        }

        Ok(Self { _alt: alt, previous })
    }
}

impl Drop for FaultGuard {
    fn drop(&mut self) {
        // Must happen before `_alt` is unmapped
        if unsafe { libc::sigaltstack(&self.previous, ptr::null_mut()) } != 0 {
            kerror!("failed to restore alternate signal stack: errno {}", Errno::last_raw());
        }
    }
}

fn install_handlers() -> Result<()> {
    for (sig, slot) in [(Signal::SIGSEGV, &PREV_SEGV), (Signal::SIGBUS, &PREV_BUS)] {
        if slot.get().is_some() {
            continue;
        }
        let action = SigAction::new(
            SigHandler::SigAction(on_fault),
            SaFlags::SA_ONSTACK | SaFlags::SA_SIGINFO | SaFlags::SA_NODEFER,
            SigSet::empty(),
        );
        // SAFETY: the handler only reads thread-locals before deciding to
        // terminate the running green thread or chain to `prev`
        let prev = unsafe { sigaction(sig, &action) }.map_err(|e| Error::Platform(e as i32))?;
        let _ = slot.set(prev);
    }
    Ok(())
}

extern "C" fn on_fault(signo: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    let addr = if info.is_null() { 0 } else { fault_address(info) };

    if tls::has_runtime() && tls::in_current_guard(addr) {
        if interrupt::is_masked() {
            kerror!("stack overflow inside the scheduler (address {:#x})", addr);
            unsafe { libc::_exit(1) };
        }
        kerror!(
            "thread {} overflowed its stack (guard page hit at {:#x}); terminating it",
            scheduler::current_id(),
            addr
        );
        scheduler::exit(None);
    }

    chain(signo);
}

/// Reinstate the action that was in place before ours
fn chain(signo: libc::c_int) {
    let (sig, slot) = match signo {
        libc::SIGBUS => (Signal::SIGBUS, &PREV_BUS),
        _ => (Signal::SIGSEGV, &PREV_SEGV),
    };
    let fallback = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    let prev = slot.get().unwrap_or(&fallback);
    // SAFETY: restoring a previously valid disposition
    if unsafe { sigaction(sig, prev) }.is_err() {
        unsafe { libc::_exit(1) };
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn fault_address(info: *mut libc::siginfo_t) -> usize {
            unsafe { (*info).si_addr() as usize }
        }
    } else {
        fn fault_address(info: *mut libc::siginfo_t) -> usize {
            unsafe { (*info).si_addr as usize }
        }
    }
}
