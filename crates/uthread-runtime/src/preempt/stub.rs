//! Platforms without per-thread CPU timers run cooperatively

use std::time::Duration;

use uthread_core::{Error, Result};

pub(crate) struct PreemptTimer;

impl PreemptTimer {
    pub fn new(_quantum: Duration) -> Result<Self> {
        Err(Error::Platform(libc::ENOSYS))
    }

    pub fn arm(&mut self) {}

    pub fn expired(&mut self) {}

    pub fn is_armed(&self) -> bool {
        false
    }
}
