//! Runtime and thread lifecycle
//!
//! One [`Runtime`] exists per OS thread. It owns the thread table, the ready
//! queue, the signal handler table and, when enabled, the quantum timer and
//! the guard-page fault handler. The OS thread's own stack becomes the
//! bootstrap green thread (id 0).
//!
//! # Transfer protocol
//!
//! Every operation that may switch threads follows the same shape:
//!
//! 1. mask preemption (`interrupt::disable`)
//! 2. borrow the runtime, mutate queues and states, compute a [`Transfer`]
//! 3. end the borrow, then perform the transfer
//! 4. on resumption, drop the mask guard
//!
//! No `&mut Runtime` is ever live across a transfer, and every transfer runs
//! at mask depth 1.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use uthread_core::kprint::{self, LogLevel};
use uthread_core::{kdebug, kerror, ktrace, kwarn};
use uthread_core::{Error, Priority, Result, ThreadId, ThreadState};

use crate::config::{self, RuntimeConfig, SchedPolicy};
use crate::context::{Context, Transfer};
use crate::fault::FaultGuard;
use crate::interrupt;
use crate::preempt::PreemptTimer;
use crate::ready_queue::{new_ready_queue, ReadyQueue};
use crate::signal::SignalTable;
use crate::thread::{Entry, ExitValue, Thread, ThreadControlBlock, ThreadTable};
use crate::tls;

/// Per-spawn overrides of the runtime configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnOptions {
    /// Stack size; the configured default when `None`
    pub stack_size: Option<usize>,
    /// Initial priority; the highest level when `None`
    pub priority: Option<Priority>,
}

/// Outcome of the non-blocking half of `join`
enum JoinStep {
    Finished(Option<ExitValue>),
    Wait(Transfer),
}

/// Scheduler state for one OS thread
pub struct Runtime {
    config: RuntimeConfig,
    pub(crate) table: ThreadTable,
    ready: Box<dyn ReadyQueue>,
    pub(crate) current: Thread,
    bootstrap: Thread,
    /// Threads created and not yet exited, bootstrap included
    live: usize,
    pub(crate) signals: SignalTable,
    timer: Option<PreemptTimer>,
    preemptions: u64,
    _fault: Option<FaultGuard>,
}

impl Runtime {
    /// Build a runtime for the calling OS thread
    ///
    /// With `strict` unset, an invalid configuration falls back to the
    /// compiled defaults and a timer or fault handler that cannot be set up
    /// is skipped with a warning.
    pub(crate) fn start(config: RuntimeConfig, strict: bool) -> Result<Box<Runtime>> {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) if strict => return Err(e.into()),
            Err(e) => {
                kwarn!("{}; using compiled defaults", e);
                RuntimeConfig::new()
            }
        };

        if config.debug_logging || cfg!(feature = "debug-logging") {
            kprint::raise_log_level(LogLevel::Debug);
        }

        let mut table = ThreadTable::new();
        let boot = ThreadControlBlock::new(table.next_id(), Context::bootstrap(), Priority::HIGHEST, None);
        let bootstrap = table.insert(boot);
        if let Some(tcb) = table.get_mut(bootstrap) {
            tcb.state = ThreadState::Running;
        }

        let mut ready = new_ready_queue(config.policy);
        ready.reserve(table.len());

        let fault = if config.guard_pages {
            match FaultGuard::install() {
                Ok(guard) => Some(guard),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    kwarn!("guard page handler unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let timer = if config.preemption {
            match PreemptTimer::new(config.quantum) {
                Ok(timer) => Some(timer),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    kwarn!("preemption timer unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        kprint::set_emitter(Some(bootstrap.id()));
        tls::set_current_guard(None);
        kdebug!(
            "runtime started: policy={} preemption={} quantum={:?} stack={} guard_pages={}",
            config.policy,
            timer.is_some(),
            config.quantum,
            config.stack_size,
            fault.is_some()
        );

        Ok(Box::new(Runtime {
            config,
            table,
            ready,
            current: bootstrap,
            bootstrap,
            live: 1,
            signals: SignalTable::new(),
            timer,
            preemptions: 0,
            _fault: fault,
        }))
    }

    /// Release every thread record and platform resource
    ///
    /// Runs from the thread-local destructor on the bootstrap stack.
    pub(crate) fn teardown(mut self: Box<Self>) {
        if self.current != self.bootstrap {
            kwarn!("OS thread exiting while green thread {} runs; leaking runtime", self.current.id());
            std::mem::forget(self);
            return;
        }
        let unjoined = self.table.len().saturating_sub(1);
        if unjoined > 0 {
            kdebug!("runtime teardown: releasing {} unjoined threads", unjoined);
        }
        // Stop the timer before the records its handler would touch
        self.timer = None;
        self.table.clear();
        tls::set_current_guard(None);
        kprint::set_emitter(None);
    }

    pub(crate) fn current_tcb(&mut self) -> &mut ThreadControlBlock {
        tcb_of(&mut self.table, self.current)
    }

    /// Put a blocked thread back on the tail of the ready queue
    pub(crate) fn make_runnable(&mut self, thread: Thread) -> bool {
        let Some(tcb) = self.table.get_mut(thread) else {
            return false;
        };
        if !tcb.state.is_blocked() {
            return false;
        }
        tcb.state = ThreadState::Runnable;
        self.ready.push_back(thread, tcb.priority);
        self.ensure_timer();
        true
    }

    pub(crate) fn enter_critical(&mut self) {
        self.current_tcb().locks_held += 1;
    }

    pub(crate) fn leave_critical(&mut self) {
        let tcb = self.current_tcb();
        tcb.locks_held = tcb.locks_held.saturating_sub(1);
        if tcb.locks_held == 0 {
            self.ensure_timer();
        }
    }

    fn spawn_thread(&mut self, entry: Entry, opts: SpawnOptions) -> Result<Thread> {
        let stack_size = opts.stack_size.unwrap_or(self.config.stack_size);
        config::validate_stack_size(stack_size)?;

        let slot = self.table.next_slot() as usize;
        let context = Context::allocate(stack_size, self.config.guard_pages, thread_entry, slot)?;
        let priority = opts.priority.unwrap_or(Priority::HIGHEST);
        let tcb = ThreadControlBlock::new(self.table.next_id(), context, priority, Some(entry));

        // Queue pushes from the timer handler must not allocate
        self.ready.reserve(self.table.len() + 1);
        let thread = self.table.insert(tcb);
        self.ready.push_back(thread, priority);
        self.live += 1;
        self.ensure_timer();

        kdebug!("spawned thread {} (stack {} bytes, {})", thread.id(), stack_size, priority);
        Ok(thread)
    }

    fn take_entry(&mut self) -> Option<Entry> {
        self.current_tcb().entry.take()
    }

    /// Make `next` the running thread and describe the transfer into it
    fn switch_to(&mut self, next: Thread) -> Option<Transfer> {
        let prev = self.current;
        if next == prev {
            self.current_tcb().state = ThreadState::Running;
            return None;
        }

        let next_tcb = tcb_of(&mut self.table, next);
        next_tcb.state = ThreadState::Running;
        let guard = next_tcb.context.guard_range();
        let to = next_tcb.context.regs_ptr() as *const _;
        let from = tcb_of(&mut self.table, prev).context.regs_ptr();

        ktrace!("switch {} -> {}", prev.id(), next.id());
        self.current = next;
        tls::set_current_guard(guard);
        kprint::set_emitter(Some(next.id()));
        if let Some(timer) = self.timer.as_mut() {
            timer.arm();
        }

        Some(Transfer { from, to })
    }

    /// Requeue the running thread at the tail and pick the next one
    fn prepare_yield(&mut self, preempted: bool) -> Option<Transfer> {
        if preempted {
            self.preemptions += 1;
            if let Some(timer) = self.timer.as_mut() {
                timer.expired();
            }
        }

        let cur = self.current;
        let tcb = tcb_of(&mut self.table, cur);
        if tcb.holds_lock() {
            return None;
        }
        // A voluntary yield ages the thread even when it keeps the CPU
        if self.ready.is_empty() {
            if !preempted {
                tcb.priority = self.ready.decay(tcb.priority);
            }
            return None;
        }

        tcb.priority = self.ready.decay(tcb.priority);
        tcb.state = ThreadState::Runnable;
        self.ready.push_back(cur, tcb.priority);

        let next = self.ready.pop()?;
        self.switch_to(next)
    }

    /// Take the running thread off the CPU in `state`
    ///
    /// Someone else is responsible for making it runnable again.
    fn prepare_block(&mut self, state: ThreadState) -> Transfer {
        let tcb = tcb_of(&mut self.table, self.current);
        tcb.state = state;
        tcb.priority = self.ready.decay(tcb.priority);

        match self.ready.pop().and_then(|next| self.switch_to(next)) {
            Some(transfer) => transfer,
            None => fatal(&format!(
                "thread {} blocked ({}) with no runnable thread left; {} live",
                self.current.id(),
                state,
                self.live
            )),
        }
    }

    fn prepare_exit(&mut self, retval: Option<ExitValue>) -> Transfer {
        let cur = self.current;
        let tcb = tcb_of(&mut self.table, cur);
        tcb.retval = retval;
        tcb.state = ThreadState::Done;
        tcb.priority = self.ready.decay(tcb.priority);
        let joiner = tcb.joiner;
        self.live -= 1;
        kdebug!("thread {} exited", cur.id());

        if let Some(joiner) = joiner {
            if let Some(jt) = self.table.get_mut(joiner) {
                jt.state = ThreadState::Runnable;
                self.ready.push_front(joiner, jt.priority);
            }
        }

        match self.ready.pop() {
            Some(next) => match self.switch_to(next) {
                Some(transfer) => transfer,
                None => fatal("exited thread selected itself"),
            },
            None if self.live == 0 => {
                kdebug!("last thread exited; terminating process");
                let _ = std::io::stdout().flush();
                tls::abandon();
                std::process::exit(0)
            }
            None => fatal(&format!("no runnable thread left; {} live threads blocked", self.live)),
        }
    }

    fn prepare_join(&mut self, target: Thread) -> Result<JoinStep> {
        let cur = self.current;
        if target == cur {
            return Err(Error::Deadlock);
        }

        let caller_origin = tcb_of(&mut self.table, cur).wait_origin;
        if self.table.get(target).is_none() {
            return Err(Error::InvalidArgument("unknown or already joined thread"));
        }
        if caller_origin == Some(target.id()) || self.waits_on(target, cur) {
            kdebug!("join {} -> {} would deadlock", cur.id(), target.id());
            return Err(Error::Deadlock);
        }

        let t = tcb_of(&mut self.table, target);
        if t.joiner.is_some_and(|j| j != cur) {
            return Err(Error::InvalidArgument("thread already has a joiner"));
        }
        if t.is_done() {
            return Ok(JoinStep::Finished(self.reap(target)));
        }

        let origin = caller_origin.unwrap_or(cur.id());
        let t = tcb_of(&mut self.table, target);
        t.wait_origin = Some(origin);
        t.joiner = Some(cur);
        tcb_of(&mut self.table, cur).waiting_on = Some(target);

        kdebug!("thread {} waits for {}", cur.id(), target.id());
        Ok(JoinStep::Wait(self.prepare_block(ThreadState::BlockedOnJoin)))
    }

    fn complete_join(&mut self, target: Thread) -> Option<ExitValue> {
        self.current_tcb().waiting_on = None;
        if !self.table.get(target).is_some_and(ThreadControlBlock::is_done) {
            fatal("joiner resumed before its target exited");
        }
        self.reap(target)
    }

    /// Collect a finished thread's value, freeing everything but the bootstrap record
    fn reap(&mut self, target: Thread) -> Option<ExitValue> {
        if target == self.bootstrap {
            let tcb = tcb_of(&mut self.table, target);
            tcb.joiner = None;
            return tcb.retval.take();
        }
        self.table.remove(target).and_then(|mut tcb| tcb.retval.take())
    }

    /// Check whether `from` is (transitively) blocked joining `needle`
    fn waits_on(&self, from: Thread, needle: Thread) -> bool {
        let mut at = from;
        for _ in 0..self.table.len() {
            match self.table.get(at).and_then(|t| t.waiting_on) {
                Some(next) if next == needle => return true,
                Some(next) => at = next,
                None => return false,
            }
        }
        false
    }

    fn ensure_timer(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            if !timer.is_armed() {
                timer.arm();
            }
        }
    }
}

fn tcb_of(table: &mut ThreadTable, thread: Thread) -> &mut ThreadControlBlock {
    match table.get_mut(thread) {
        Some(tcb) => tcb,
        None => fatal(&format!("thread record {} missing", thread.id())),
    }
}

/// Unrecoverable scheduler state
fn fatal(msg: &str) -> ! {
    kerror!("uthread: {}", msg);
    std::process::abort()
}

/// Run `f` against this OS thread's runtime, creating it on first use
///
/// Callers hold the interrupt mask and must not transfer context inside `f`.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    debug_assert!(interrupt::is_masked());
    let mut rt = tls::runtime_ptr();
    if rt.is_null() {
        let fresh = match Runtime::start(RuntimeConfig::from_env(), false) {
            Ok(fresh) => fresh,
            Err(e) => fatal(&format!("cannot start runtime: {}", e)),
        };
        rt = tls::install(fresh);
    }
    // SAFETY: the runtime belongs to this OS thread, preemption is masked and
    // no other borrow is live (borrows never span a transfer)
    f(unsafe { &mut *rt })
}

/// Entry point for every spawned thread, reached by its first dispatch
extern "C" fn thread_entry(slot: usize) {
    // The dispatcher switched in at mask depth 1
    interrupt::enable();

    let entry = {
        let _mask = interrupt::disable();
        with_runtime(|rt| {
            debug_assert_eq!(rt.current.slot(), slot);
            rt.take_entry()
        })
    };

    let retval = match entry {
        Some(body) => match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => value,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("non-string payload");
                kerror!("thread panicked: {}", msg);
                None
            }
        },
        None => None,
    };

    exit(retval)
}

// ============================================================================
// Public operations
// ============================================================================

/// Start the runtime on this OS thread with an explicit configuration
///
/// Fails with `AlreadyInitialized` if any uthread call already created one.
pub fn init(config: RuntimeConfig) -> Result<()> {
    if tls::has_runtime() {
        return Err(Error::AlreadyInitialized);
    }
    let _mask = interrupt::disable();
    let rt = Runtime::start(config, true)?;
    tls::install(rt);
    Ok(())
}

/// Create a green thread running `entry`, queued at the tail
pub fn spawn(entry: Entry, opts: SpawnOptions) -> Result<Thread> {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.spawn_thread(entry, opts))
}

/// Handle of the running thread
pub fn current() -> Thread {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.current)
}

/// Give up the CPU to the next runnable thread
///
/// A no-op while the caller holds a mutex or nothing else is runnable.
pub fn yield_now() {
    let _mask = interrupt::disable();
    if let Some(transfer) = with_runtime(|rt| rt.prepare_yield(false)) {
        // SAFETY: computed under the mask and the runtime borrow has ended
        unsafe { transfer.perform() };
    }
}

/// Forced yield from the quantum timer or a deferred preemption
pub(crate) fn preempt_current() {
    let _mask = interrupt::disable();
    if let Some(transfer) = with_runtime(|rt| rt.prepare_yield(true)) {
        // SAFETY: computed under the mask and the runtime borrow has ended
        unsafe { transfer.perform() };
    }
}

/// Block the running thread until another thread calls `make_runnable`
///
/// The caller holds exactly one mask guard.
pub(crate) fn park_current(state: ThreadState) {
    debug_assert_eq!(interrupt::depth(), 1);
    let transfer = with_runtime(|rt| rt.prepare_block(state));
    // SAFETY: the caller is parked in a wait queue and owns no runtime borrow
    unsafe { transfer.perform() };
}

/// Wake a thread parked by `park_current`
pub(crate) fn make_runnable(thread: Thread) -> bool {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.make_runnable(thread))
}

/// Mark the running thread as holding one more lock
pub(crate) fn enter_critical() {
    let _mask = interrupt::disable();
    with_runtime(Runtime::enter_critical);
}

pub(crate) fn leave_critical() {
    let _mask = interrupt::disable();
    with_runtime(Runtime::leave_critical);
}

/// Check whether the running thread holds a lock, which suppresses its yields
pub(crate) fn holds_lock() -> bool {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.current_tcb().holds_lock())
}

/// Wait for `target` to exit and collect its value
///
/// Fails with `Deadlock` when `target` is the caller or is (transitively)
/// waiting on it, and with `InvalidArgument` for a stale handle or a target
/// that already has a joiner. The target's stack is released on success.
pub fn join(target: Thread) -> Result<Option<ExitValue>> {
    let _mask = interrupt::disable();
    match with_runtime(|rt| rt.prepare_join(target))? {
        JoinStep::Finished(value) => Ok(value),
        JoinStep::Wait(transfer) => {
            // SAFETY: the target keeps our context alive until it wakes us
            unsafe { transfer.perform() };
            Ok(with_runtime(|rt| rt.complete_join(target)))
        }
    }
}

/// Terminate the running thread, leaving `retval` for its joiner
///
/// Destructors of values on the exiting thread's stack are not run. When the
/// last live thread exits the process exits with status 0.
pub fn exit(retval: Option<ExitValue>) -> ! {
    let _mask = interrupt::disable();
    let transfer = with_runtime(|rt| rt.prepare_exit(retval));
    // SAFETY: our record stays in the table until the joiner reaps it
    unsafe { transfer.perform() };
    fatal("exited thread was resumed")
}

/// State of `thread`, `None` once it has been joined
pub fn thread_state(thread: Thread) -> Option<ThreadState> {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.table.get(thread).map(|t| t.state))
}

/// Threads created and not yet exited, bootstrap included
pub fn live_threads() -> usize {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.live)
}

/// Priority of the running thread
pub fn current_priority() -> Priority {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.current_tcb().priority)
}

/// Policy of this OS thread's runtime
pub fn policy() -> SchedPolicy {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.ready.policy())
}

/// Forced yields taken so far
pub fn preemptions() -> u64 {
    let _mask = interrupt::disable();
    with_runtime(|rt| rt.preemptions)
}

/// Id of the running thread
pub fn current_id() -> ThreadId {
    current().id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn body<F: FnOnce() + 'static>(f: F) -> Entry {
        Box::new(move || {
            f();
            None
        })
    }

    #[test]
    fn test_bootstrap_thread() {
        assert_eq!(current().id(), ThreadId::BOOTSTRAP);
        assert_eq!(live_threads(), 1);
        assert_eq!(thread_state(current()), Some(ThreadState::Running));
        // Yield with nothing else runnable is a no-op
        yield_now();
        assert_eq!(current().id(), ThreadId::BOOTSTRAP);
    }

    #[test]
    fn test_init_after_use_fails() {
        let _ = current();
        assert_eq!(init(RuntimeConfig::new()), Err(Error::AlreadyInitialized));
    }

    #[test]
    fn test_spawn_runs_in_fifo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let log = log.clone();
            handles.push(spawn(body(move || log.borrow_mut().push(i)), SpawnOptions::default()).unwrap());
        }
        assert_eq!(live_threads(), 4);
        for h in handles {
            join(h).unwrap();
        }
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(live_threads(), 1);
    }

    #[test]
    fn test_join_returns_value_and_frees() {
        let t = spawn(Box::new(|| Some(Box::new(7u32) as ExitValue)), SpawnOptions::default()).unwrap();
        let v = join(t).unwrap().unwrap();
        assert_eq!(*v.downcast::<u32>().unwrap(), 7);
        assert_eq!(thread_state(t), None);
        assert!(matches!(join(t), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_self_join_is_deadlock() {
        assert!(matches!(join(current()), Err(Error::Deadlock)));
    }

    #[test]
    fn test_small_stack_rejected() {
        let opts = SpawnOptions {
            stack_size: Some(1024),
            priority: None,
        };
        assert!(matches!(spawn(body(|| ()), opts), Err(Error::Config(_))));
    }

    #[test]
    fn test_lone_yield_decays_priority() {
        init(RuntimeConfig::new().policy(SchedPolicy::Priority)).unwrap();
        assert_eq!(current_priority(), Priority::HIGHEST);
        yield_now();
        assert_eq!(current().id(), ThreadId::BOOTSTRAP);
        assert_eq!(current_priority(), Priority::HIGHEST.decayed());
    }

    #[test]
    fn test_panic_is_abnormal_exit() {
        let t = spawn(Box::new(|| panic!("boom")), SpawnOptions::default()).unwrap();
        assert!(join(t).unwrap().is_none());
    }
}
