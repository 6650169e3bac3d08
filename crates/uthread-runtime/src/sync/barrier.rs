//! Reusable rendezvous point for a fixed number of threads

use std::sync::atomic::{AtomicU32, Ordering};

use uthread_core::{Error, Result};

use super::spin_wait;

#[derive(Debug)]
pub struct Barrier {
    parties: u32,
    arrived: AtomicU32,
    /// Bumped by the last arrival of each round
    generation: AtomicU32,
}

impl Barrier {
    pub fn new(parties: u32) -> Result<Self> {
        if parties == 0 {
            return Err(Error::InvalidArgument("barrier needs at least one party"));
        }
        Ok(Self {
            parties,
            arrived: AtomicU32::new(0),
            generation: AtomicU32::new(0),
        })
    }

    /// Wait until all parties of the current round have arrived
    ///
    /// Returns `true` for exactly one thread per round, the one whose arrival
    /// completed it.
    pub fn wait(&self) -> Result<bool> {
        let generation = self.generation.load(Ordering::Acquire);
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == self.parties {
            self.arrived.store(0, Ordering::Release);
            self.generation.fetch_add(1, Ordering::AcqRel);
            return Ok(true);
        }

        while self.generation.load(Ordering::Acquire) == generation {
            if let Err(e) = spin_wait() {
                self.arrived.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        }
        Ok(false)
    }

    pub fn parties(&self) -> u32 {
        self.parties
    }
}
