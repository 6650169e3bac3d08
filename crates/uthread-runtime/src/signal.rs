//! Inter-thread signals
//!
//! Each thread owns a bounded [`Mailbox`]. `send_signal` drops the signal
//! when the mailbox is full; the receiver consumes signals with
//! `await_signal`, which yields until a matching one is queued and then runs
//! the action installed for it in the runtime-wide [`SignalTable`].

use crossbeam_queue::ArrayQueue;

use uthread_core::constants::SIGNAL_MAILBOX_CAPACITY;
use uthread_core::{kdebug, kinfo, kwarn};
use uthread_core::{Error, Result, Signal, SignalAction};

use crate::interrupt;
use crate::scheduler::{self, with_runtime};
use crate::sync::spin_wait;
use crate::thread::Thread;

/// Pending signals of one thread, oldest first
pub(crate) struct Mailbox {
    queue: ArrayQueue<Signal>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            queue: ArrayQueue::new(SIGNAL_MAILBOX_CAPACITY),
        }
    }

    /// Queue `sig`, returning false when the mailbox is full
    pub fn post(&self, sig: Signal) -> bool {
        self.queue.push(sig).is_ok()
    }

    /// Remove the oldest pending `sig`, keeping the others in order
    pub fn take(&self, sig: Signal) -> bool {
        let mut found = false;
        for _ in 0..self.queue.len() {
            let Some(head) = self.queue.pop() else {
                break;
            };
            if !found && head == sig {
                found = true;
            } else {
                // Capacity was freed by the pop above
                let _ = self.queue.push(head);
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Installed action per signal, plus the one it replaced
#[derive(Debug, Default)]
pub(crate) struct SignalTable {
    actions: [SignalAction; Signal::COUNT],
    previous: [SignalAction; Signal::COUNT],
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sig: Signal) -> SignalAction {
        self.actions[sig.as_index()]
    }

    /// Install `action` for `sig` and return the old one
    pub fn set(&mut self, sig: Signal, action: SignalAction) -> Result<SignalAction> {
        if sig == Signal::Kill && matches!(action, SignalAction::Ignore) {
            kwarn!("{} cannot be ignored", sig.name());
            return Err(Error::InvalidArgument("SIG_KILL cannot be ignored"));
        }
        let old = std::mem::replace(&mut self.actions[sig.as_index()], action);
        self.previous[sig.as_index()] = old;
        Ok(old)
    }

    /// Action replaced by the latest `set`
    pub fn previous(&self, sig: Signal) -> SignalAction {
        self.previous[sig.as_index()]
    }
}

/// Queue `sig` in `target`'s mailbox
///
/// Returns `Ok(false)` when the mailbox is full and the signal was dropped,
/// and `InvalidArgument` for a thread that no longer exists.
pub fn send_signal(target: Thread, sig: Signal) -> Result<bool> {
    let _mask = interrupt::disable();
    with_runtime(|rt| {
        let from = rt.current.id();
        let tcb = rt
            .table
            .get(target)
            .ok_or(Error::InvalidArgument("unknown or already joined thread"))?;
        let queued = tcb.mailbox.post(sig);
        if queued {
            kdebug!("thread {} sends {} to thread {}", from, sig, target.id());
        } else {
            kdebug!("mailbox of thread {} full; {} dropped", target.id(), sig);
        }
        Ok(queued)
    })
}

fn take_pending(sig: Signal) -> bool {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.current_tcb().mailbox.take(sig))
}

/// Signals waiting in the running thread's mailbox
pub fn pending_signals() -> usize {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.current_tcb().mailbox.len())
}

/// Yield until `sig` arrives, then run its action
///
/// Fails with `Deadlock` if `sig` is not yet queued and the caller holds a
/// mutex, since no sender could run.
pub fn await_signal(sig: Signal) -> Result<bool> {
    while !take_pending(sig) {
        spin_wait()?;
    }
    deliver(sig);
    Ok(true)
}

/// Like [`await_signal`] but gives up after `budget` yields
///
/// The action runs either way; the return value tells whether `sig` actually
/// arrived.
pub fn await_signal_timed(sig: Signal, budget: u32) -> Result<bool> {
    let mut arrived = take_pending(sig);
    let mut spent = 0;
    while !arrived && spent < budget {
        spin_wait()?;
        spent += 1;
        arrived = take_pending(sig);
    }
    if !arrived {
        kdebug!("{} not received after {} yields", sig, budget);
    }
    deliver(sig);
    Ok(arrived)
}

/// Install `action` for `sig` on this OS thread's runtime
///
/// Returns the previous action. `SIG_KILL` cannot be set to
/// [`SignalAction::Ignore`]; that request fails and leaves the current
/// action installed.
pub fn set_signal_handler(sig: Signal, action: SignalAction) -> Result<SignalAction> {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.signals.set(sig, action))
}

/// Action currently installed for `sig`
pub fn signal_handler(sig: Signal) -> SignalAction {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.signals.get(sig))
}

/// Action `sig` had before the latest `set_signal_handler`
pub fn previous_signal_handler(sig: Signal) -> SignalAction {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.signals.previous(sig))
}

/// Run the action for `sig` on the calling thread, outside the mask
fn deliver(sig: Signal) {
    match signal_handler(sig) {
        SignalAction::Default => default_action(sig),
        SignalAction::Ignore => {}
        SignalAction::Handler(f) => f(sig),
    }
}

fn default_action(sig: Signal) {
    let me = scheduler::current_id();
    match sig {
        Signal::Kill => {
            kinfo!("thread {} receives {}", me, sig.name());
            scheduler::exit(None)
        }
        Signal::User1 | Signal::User2 => kinfo!("thread {} receives {}", me, sig.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_capacity() {
        let mb = Mailbox::new();
        for _ in 0..SIGNAL_MAILBOX_CAPACITY {
            assert!(mb.post(Signal::User1));
        }
        assert!(!mb.post(Signal::User2));
        assert_eq!(mb.len(), SIGNAL_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_mailbox_take_keeps_order() {
        let mb = Mailbox::new();
        mb.post(Signal::User1);
        mb.post(Signal::User2);
        mb.post(Signal::User1);
        mb.post(Signal::Kill);

        assert!(mb.take(Signal::User2));
        assert!(!mb.take(Signal::User2));
        assert_eq!(mb.len(), 3);
        assert!(mb.take(Signal::User1));
        assert!(mb.take(Signal::User1));
        assert!(mb.take(Signal::Kill));
        assert_eq!(mb.len(), 0);
    }

    #[test]
    fn test_table_rejects_ignoring_kill() {
        let mut table = SignalTable::new();
        assert!(table.set(Signal::Kill, SignalAction::Ignore).is_err());
        assert_eq!(table.get(Signal::Kill), SignalAction::Default);

        fn noop(_: Signal) {}
        let old = table.set(Signal::User1, SignalAction::Handler(noop)).unwrap();
        assert_eq!(old, SignalAction::Default);
        let old = table.set(Signal::User1, SignalAction::Ignore).unwrap();
        assert!(matches!(old, SignalAction::Handler(_)));
        assert!(matches!(table.previous(Signal::User1), SignalAction::Handler(_)));
    }

    #[test]
    fn test_send_to_self_and_await() {
        let me = scheduler::current();
        assert!(send_signal(me, Signal::User2).unwrap());
        assert_eq!(pending_signals(), 1);
        assert_eq!(await_signal(Signal::User2), Ok(true));
        assert_eq!(pending_signals(), 0);
        assert_eq!(await_signal_timed(Signal::User1, 3), Ok(false));
    }

    #[test]
    fn test_wait_under_mutex_fails() {
        let m = crate::sync::Mutex::new(());
        let _g = m.lock().unwrap();
        assert_eq!(await_signal(Signal::User1), Err(Error::Deadlock));
        assert_eq!(await_signal_timed(Signal::User1, 4), Err(Error::Deadlock));

        // Already queued: no yield needed, so the wait succeeds
        send_signal(scheduler::current(), Signal::User2).unwrap();
        assert_eq!(await_signal(Signal::User2), Ok(true));
    }
}
