//! Thread state and priority types

use core::fmt;

use crate::constants::MAX_PRIORITY;

/// State of a green thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// In a ready queue, waiting to be dispatched
    Runnable = 0,

    /// Currently executing (exactly one thread per runtime)
    Running = 1,

    /// Waiting for a join target to exit
    BlockedOnJoin = 2,

    /// Parked in a condition variable wait queue
    BlockedInSync = 3,

    /// Exited; return value stored, awaiting join
    Done = 4,
}

impl ThreadState {
    /// Check if the thread is waiting on something other than the CPU
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, ThreadState::BlockedOnJoin | ThreadState::BlockedInSync)
    }

    /// Check if this thread has terminated
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, ThreadState::Done)
    }
}

impl From<u8> for ThreadState {
    fn from(v: u8) -> Self {
        match v {
            0 => ThreadState::Runnable,
            1 => ThreadState::Running,
            2 => ThreadState::BlockedOnJoin,
            3 => ThreadState::BlockedInSync,
            _ => ThreadState::Done,
        }
    }
}

impl From<ThreadState> for u8 {
    fn from(state: ThreadState) -> u8 {
        state as u8
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Runnable => write!(f, "RUNNABLE"),
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::BlockedOnJoin => write!(f, "BLOCKED_ON_JOIN"),
            ThreadState::BlockedInSync => write!(f, "BLOCKED_IN_SYNC"),
            ThreadState::Done => write!(f, "DONE"),
        }
    }
}

/// Priority level of a green thread
///
/// Levels run from 0 (lowest) to `MAX_PRIORITY - 1` (highest); the priority
/// policy always dispatches from the highest non-empty level. Under the FIFO
/// policy the level is carried but never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Number of priority levels
    pub const COUNT: usize = MAX_PRIORITY;

    /// Lowest level
    pub const LOWEST: Priority = Priority(0);

    /// Highest level, given to newly created threads
    pub const HIGHEST: Priority = Priority((MAX_PRIORITY - 1) as u8);

    /// Create a priority, `None` if `level` is out of range
    #[inline]
    pub const fn new(level: u8) -> Option<Priority> {
        if (level as usize) < MAX_PRIORITY {
            Some(Priority(level))
        } else {
            None
        }
    }

    /// Get priority as queue index
    #[inline]
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }

    /// One level down; the lowest level wraps around to the highest
    #[inline]
    pub const fn decayed(self) -> Priority {
        if self.0 == 0 {
            Priority::HIGHEST
        } else {
            Priority(self.0 - 1)
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::HIGHEST
    }
}

impl TryFrom<u8> for Priority {
    type Error = crate::Error;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Priority::new(v).ok_or(crate::Error::InvalidArgument("priority out of range"))
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ThreadState::BlockedOnJoin.is_blocked());
        assert!(ThreadState::BlockedInSync.is_blocked());
        assert!(!ThreadState::Runnable.is_blocked());
        assert!(ThreadState::Done.is_terminated());
        assert!(!ThreadState::Running.is_terminated());
    }

    #[test]
    fn test_state_u8_roundtrip() {
        for s in [
            ThreadState::Runnable,
            ThreadState::Running,
            ThreadState::BlockedOnJoin,
            ThreadState::BlockedInSync,
            ThreadState::Done,
        ] {
            assert_eq!(ThreadState::from(u8::from(s)), s);
        }
    }

    #[test]
    fn test_priority_bounds() {
        assert_eq!(Priority::LOWEST.as_index(), 0);
        assert_eq!(Priority::HIGHEST.as_index(), MAX_PRIORITY - 1);
        assert!(Priority::new(MAX_PRIORITY as u8).is_none());
        assert!(Priority::try_from(200u8).is_err());
        assert_eq!(Priority::default(), Priority::HIGHEST);
    }

    #[test]
    fn test_priority_decay_wraps() {
        let p = Priority::new(1).unwrap();
        assert_eq!(p.decayed(), Priority::LOWEST);
        assert_eq!(Priority::LOWEST.decayed(), Priority::HIGHEST);

        // A full cycle of decays returns to the starting level
        let mut q = Priority::HIGHEST;
        for _ in 0..MAX_PRIORITY {
            q = q.decayed();
        }
        assert_eq!(q, Priority::HIGHEST);
    }
}
