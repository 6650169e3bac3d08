//! # uthread - M:1 green threads
//!
//! Many user-space threads multiplexed onto the calling OS thread.
//!
//! ## Features
//!
//! - **Explicit context switch**: hand-written assembly for x86_64 and aarch64
//! - **Two policies**: FIFO, or ten priority levels with decay on reschedule
//! - **Join with deadlock detection**: join cycles fail instead of hanging
//! - **Preemption**: optional per-thread CPU-time quantum (Linux)
//! - **Guard pages**: a stack overflow kills only the offending thread
//! - **Synchronization**: Mutex, Semaphore, Barrier, Condvar
//! - **Signals**: per-thread mailbox for USER1, USER2 and KILL
//!
//! ## Quick Start
//!
//! ```ignore
//! use uthread::{spawn, yield_now};
//!
//! fn main() -> uthread::Result<()> {
//!     let h = spawn(|| {
//!         yield_now();
//!         21 * 2
//!     })?;
//!     assert_eq!(h.join()?, Some(42));
//!     Ok(())
//! }
//! ```
//!
//! The calling OS thread's own stack becomes thread 0. A runtime is created
//! on first use from the `UTHREAD_*` environment; call [`init`] first to
//! configure it explicitly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        spawn(), join(), yield_now(), primitives, signals    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Runtime (one per OS thread)                     │
//! │     thread table, ready queue, signal table, interrupt mask │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌─────────────┐
//!    │  Context  │      │  Quantum  │      │ Guard page  │
//!    │  switch   │      │   timer   │      │  handler    │
//!    └───────────┘      └───────────┘      └─────────────┘
//!          │
//!          ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │            mmap'd stacks with guard pages               │
//!    └─────────────────────────────────────────────────────────┘
//! ```

use std::marker::PhantomData;

// Re-export core types
pub use uthread_core::{
    constants, ConfigError, Error, Priority, Result, Signal, SignalAction, ThreadId, ThreadState,
};

// Re-export kprint macros for debug logging
pub use uthread_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use uthread_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use uthread_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

// Re-export runtime types
pub use uthread_runtime::{
    await_signal, await_signal_timed, current, current_priority, init, live_threads,
    pending_signals, policy, preemptions, previous_signal_handler, send_signal, set_signal_handler,
    signal_handler, thread_state, yield_now, Barrier, Condvar, ExitValue, Mutex, MutexGuard,
    RuntimeConfig, SchedPolicy, Semaphore, Thread,
};

use uthread_runtime::scheduler::{self, SpawnOptions};

/// Spawn a green thread with the configured stack size and highest priority
///
/// # Example
///
/// ```ignore
/// let h = uthread::spawn(|| "done")?;
/// assert_eq!(h.join()?, Some("done"));
/// ```
pub fn spawn<F, T>(f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + 'static,
    T: 'static,
{
    Builder::new().spawn(f)
}

/// Thread factory for per-thread stack size and priority
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    opts: SpawnOptions,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack size in bytes (rounded up to whole pages)
    pub fn stack_size(mut self, size: usize) -> Self {
        self.opts.stack_size = Some(size);
        self
    }

    /// Initial priority; only meaningful under [`SchedPolicy::Priority`]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.opts.priority = Some(priority);
        self
    }

    pub fn spawn<F, T>(self, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + 'static,
        T: 'static,
    {
        let entry = Box::new(move || Some(Box::new(f()) as ExitValue));
        let thread = scheduler::spawn(entry, self.opts)?;
        Ok(JoinHandle {
            thread,
            _marker: PhantomData,
        })
    }
}

/// Owned permission to join a thread and collect its typed value
#[derive(Debug)]
pub struct JoinHandle<T> {
    thread: Thread,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> JoinHandle<T> {
    /// Wait for the thread and take its value
    ///
    /// `Ok(None)` means the thread ended abnormally: killed, stack overflow,
    /// panic, or `exit` without a value of type `T`.
    pub fn join(self) -> Result<Option<T>> {
        let value = scheduler::join(self.thread)?;
        Ok(value.and_then(|v| v.downcast::<T>().ok()).map(|v| *v))
    }

    /// Untyped handle, for signals and introspection
    pub fn thread(&self) -> Thread {
        self.thread
    }

    pub fn id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Check whether the thread has finished and is waiting to be joined
    pub fn is_finished(&self) -> bool {
        thread_state(self.thread).is_some_and(|s| s.is_terminated())
    }
}

/// Wait for `thread` and collect its untyped value
pub fn join(thread: Thread) -> Result<Option<ExitValue>> {
    scheduler::join(thread)
}

/// Terminate the running thread without a value
pub fn exit() -> ! {
    scheduler::exit(None)
}

/// Terminate the running thread, leaving `value` for the joiner
pub fn exit_with<T: 'static>(value: T) -> ! {
    scheduler::exit(Some(Box::new(value)))
}

/// Id of the running thread
pub fn current_id() -> ThreadId {
    current().id()
}
