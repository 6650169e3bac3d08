//! Green thread identifier type

use core::fmt;

/// Stable identity of a green thread
///
/// Assigned at creation from a monotonically increasing per-runtime counter
/// and never reused, so a stale handle can always be told apart from a thread
/// that later occupies the same table slot. The bootstrap thread is id 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u64);

impl ThreadId {
    /// The bootstrap thread
    pub const BOOTSTRAP: ThreadId = ThreadId(crate::constants::BOOTSTRAP_THREAD_ID);

    /// Create a new ThreadId from a raw value
    #[inline]
    pub const fn new(id: u64) -> Self {
        ThreadId(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the bootstrap thread
    #[inline]
    pub const fn is_bootstrap(self) -> bool {
        self.0 == crate::constants::BOOTSTRAP_THREAD_ID
    }

    /// The id that follows this one
    #[inline]
    pub const fn next(self) -> ThreadId {
        ThreadId(self.0 + 1)
    }
}

impl From<u64> for ThreadId {
    #[inline]
    fn from(id: u64) -> Self {
        ThreadId(id)
    }
}

impl From<ThreadId> for u64 {
    #[inline]
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
