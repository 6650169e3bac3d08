//! Linux quantum timer: POSIX timer on the thread CPU clock

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigEvent, SigHandler, SigSet, SigevNotify, Signal};
use nix::sys::time::TimeSpec;
use nix::sys::timer::{Expiration, Timer, TimerSetTimeFlags};
use nix::time::ClockId;
use nix::unistd::gettid;

use uthread_core::{kwarn, Error, Result};

use crate::{interrupt, scheduler, tls};

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// One-shot CPU-time timer re-armed on every dispatch
pub(crate) struct PreemptTimer {
    timer: Timer,
    quantum: TimeSpec,
    armed: bool,
}

impl PreemptTimer {
    pub fn new(quantum: Duration) -> Result<Self> {
        install_handler()?;

        let event = SigEvent::new(SigevNotify::SigevThreadId {
            signal: Signal::SIGVTALRM,
            thread_id: gettid().as_raw(),
            si_value: 0,
        });
        let timer = Timer::new(ClockId::CLOCK_THREAD_CPUTIME_ID, event).map_err(platform)?;

        Ok(Self {
            timer,
            quantum: TimeSpec::from_duration(quantum),
            armed: false,
        })
    }

    /// Start a fresh quantum for the thread being dispatched
    pub fn arm(&mut self) {
        match self.timer.set(Expiration::OneShot(self.quantum), TimerSetTimeFlags::empty()) {
            Ok(()) => self.armed = true,
            Err(e) => {
                kwarn!("failed to arm quantum timer: {}", e);
                self.armed = false;
            }
        }
    }

    /// Note that the quantum ran out and nothing re-armed the timer
    pub fn expired(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

fn platform(e: Errno) -> Error {
    Error::Platform(e as i32)
}

/// Install the SIGVTALRM handler once per process
fn install_handler() -> Result<()> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    let action = SigAction::new(
        SigHandler::Handler(on_quantum),
        SaFlags::SA_RESTART | SaFlags::SA_NODEFER,
        SigSet::empty(),
    );
    // SAFETY: the handler only touches this thread's thread-locals and the
    // runtime behind the interrupt mask
    if let Err(e) = unsafe { sigaction(Signal::SIGVTALRM, &action) } {
        HANDLER_INSTALLED.store(false, Ordering::SeqCst);
        return Err(platform(e));
    }
    Ok(())
}

extern "C" fn on_quantum(_sig: libc::c_int) {
    if !tls::has_runtime() {
        return;
    }
    if interrupt::is_masked() {
        interrupt::defer_preemption();
        return;
    }

    // The preempted thread resumes here, possibly much later
    let saved = Errno::last_raw();
    scheduler::preempt_current();
    Errno::set_raw(saved);
}
