//! Error types for the uthread runtime
//!
//! A single taxonomy is shared by every operation: thread lifecycle calls,
//! the synchronization primitives and the signal API all return [`Result`].
//! Errors are small `Copy` values so they can be produced from inside the
//! scheduler without allocating.

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur in runtime operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A handle, signal id or argument was not acceptable.
    ///
    /// Covers stale thread handles (target already joined), a second joiner
    /// on the same target, malformed signal ids, and misuse of a primitive
    /// such as unlocking a mutex the caller does not hold.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Blocking would close a wait cycle.
    ///
    /// Reported by `join` when the target is (transitively) waiting on the
    /// caller, and by `Mutex::lock` when the caller already owns the mutex.
    #[error("deadlock detected")]
    Deadlock,

    /// Stack or table allocation failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Operation on a semaphore that has been, or is being, destroyed.
    #[error("object destroyed")]
    Destroyed,

    /// A runtime already exists on the calling OS thread.
    #[error("runtime already initialized")]
    AlreadyInitialized,

    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An OS call failed; carries the errno.
    #[error("platform error: errno {0}")]
    Platform(i32),
}

impl Error {
    /// Errno-style code for callers that want a C-like status
    pub const fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 22, // EINVAL
            Error::Deadlock => 35,           // EDEADLK
            Error::ResourceExhausted(_) => 12, // ENOMEM
            Error::Destroyed => 43,          // EIDRM
            Error::AlreadyInitialized => 16, // EBUSY
            Error::Config(_) => 22,          // EINVAL
            Error::Platform(errno) => *errno,
        }
    }
}

/// Configuration validation error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}
