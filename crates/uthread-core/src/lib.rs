//! # uthread-core
//!
//! Core types for the uthread M:1 green thread runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Context switching, stacks, scheduling and the primitives built on them
//! live in `uthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - Green thread identifier type
//! - `state` - Thread state and priority level types
//! - `signal` - Closed set of inter-thread signals and handler actions
//! - `error` - Error taxonomy shared by every crate in the workspace
//! - `kprint` - Kernel-style leveled printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod signal;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::{Priority, ThreadState};
pub use signal::{Signal, SignalAction};
pub use error::{ConfigError, Error, Result};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Constants shared by the runtime and the facade
pub mod constants {
    /// Number of priority levels (0 = lowest, `MAX_PRIORITY - 1` = highest)
    pub const MAX_PRIORITY: usize = 10;

    /// Pending signals a single mailbox can hold; further sends are dropped
    pub const SIGNAL_MAILBOX_CAPACITY: usize = 10;

    /// Page size assumed for guard pages and stack rounding
    pub const PAGE_SIZE: usize = 4096;

    /// Smallest stack a green thread may be created with (16 KB)
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Stack size used when neither the builder nor the config says otherwise
    pub const DEFAULT_STACK_SIZE: usize = 128 * 1024;

    /// Preemption quantum in milliseconds
    pub const DEFAULT_QUANTUM_MS: u64 = 10;

    /// Identity of the bootstrap thread (the OS thread's own stack)
    pub const BOOTSTRAP_THREAD_ID: u64 = 0;
}
