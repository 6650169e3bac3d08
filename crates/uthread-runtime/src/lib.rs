//! # uthread-runtime
//!
//! Platform-specific runtime for uthread green threads.
//!
//! This crate provides:
//! - Context switching (architecture-specific assembly)
//! - Stack memory with optional guard pages (mmap)
//! - FIFO and priority ready queues
//! - The per-OS-thread scheduler and thread lifecycle
//! - Timer-driven preemption behind a software interrupt mask
//! - Mutex, semaphore, barrier and condition variable
//! - Inter-thread signals

pub mod arch;
pub mod config;
pub mod context;
pub mod interrupt;
pub mod memory;
pub mod ready_queue;
pub mod scheduler;
pub mod signal;
pub mod sync;
pub mod thread;
pub mod tls;

mod fault;
mod preempt;

// Re-exports
pub use config::{RuntimeConfig, SchedPolicy};
pub use scheduler::{
    current, current_priority, exit, init, join, live_threads, policy, preemptions, spawn,
    thread_state, yield_now, SpawnOptions,
};
pub use signal::{
    await_signal, await_signal_timed, pending_signals, previous_signal_handler, send_signal,
    set_signal_handler, signal_handler,
};
pub use sync::{Barrier, Condvar, Mutex, MutexGuard, Semaphore};
pub use thread::{ExitValue, Thread};

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
