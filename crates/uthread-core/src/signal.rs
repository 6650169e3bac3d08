//! Inter-thread signals
//!
//! A closed set of three signals delivered through per-thread mailboxes.
//! These are unrelated to POSIX signals; they never leave the runtime.

use core::fmt;

use crate::error::Error;

/// A signal one green thread can post to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signal {
    User1 = 0,
    User2 = 1,
    /// Terminates the receiving thread unless a handler is installed.
    /// Can never be ignored.
    Kill = 2,
}

impl Signal {
    /// Number of distinct signals
    pub const COUNT: usize = 3;

    /// All signals in id order
    pub const ALL: [Signal; Signal::COUNT] = [Signal::User1, Signal::User2, Signal::Kill];

    /// Index into per-signal tables
    #[inline]
    pub const fn as_index(self) -> usize {
        self as usize
    }

    /// Diagnostic name
    pub const fn name(self) -> &'static str {
        match self {
            Signal::User1 => "SIG_USER1",
            Signal::User2 => "SIG_USER2",
            Signal::Kill => "SIG_KILL",
        }
    }
}

impl TryFrom<i32> for Signal {
    type Error = Error;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Signal::User1),
            1 => Ok(Signal::User2),
            2 => Ok(Signal::Kill),
            _ => Err(Error::InvalidArgument("malformed signal id")),
        }
    }
}

impl From<Signal> for i32 {
    fn from(s: Signal) -> i32 {
        s as i32
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens when a thread consumes a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalAction {
    /// Built-in behaviour: KILL exits the thread, USER1/USER2 log a notice
    #[default]
    Default,
    /// Consume the signal and do nothing (not permitted for KILL)
    Ignore,
    /// Call a user function on the receiving thread
    Handler(fn(Signal)),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_ids() {
        for s in Signal::ALL {
            assert_eq!(Signal::try_from(i32::from(s)), Ok(s));
        }
        assert_eq!(Signal::Kill.as_index(), 2);
    }

    #[test]
    fn test_malformed_signal_id() {
        assert!(matches!(Signal::try_from(3i32), Err(Error::InvalidArgument(_))));
        assert!(matches!(Signal::try_from(-1i32), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::User1.name(), "SIG_USER1");
        assert_eq!(Signal::User2.to_string(), "SIG_USER2");
        assert_eq!(format!("{}", Signal::Kill), "SIG_KILL");
    }

    #[test]
    fn test_default_action() {
        assert_eq!(SignalAction::default(), SignalAction::Default);
    }
}
