//! Condition variable
//!
//! Unlike the other primitives, waiters are parked off the ready queue and
//! only come back when `signal` or `broadcast` moves them to its tail.

use std::cell::RefCell;
use std::collections::VecDeque;

use uthread_core::{kwarn, Result, ThreadState};

use super::{Mutex, MutexGuard};
use crate::interrupt;
use crate::scheduler;
use crate::thread::Thread;

#[derive(Debug, Default)]
pub struct Condvar {
    /// Parked threads, oldest first; only touched with preemption masked
    waiters: RefCell<VecDeque<Thread>>,
}

impl Condvar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release `guard`'s mutex, park until signalled, then relock it
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>> {
        let mutex: &'a Mutex<T> = {
            let _mask = interrupt::disable();
            let me = scheduler::current();
            self.waiters.borrow_mut().push_back(me);

            let mutex = match guard.unlock_for_wait() {
                Ok(mutex) => mutex,
                Err(e) => {
                    self.waiters.borrow_mut().retain(|t| *t != me);
                    return Err(e);
                }
            };
            scheduler::park_current(ThreadState::BlockedInSync);

            // Woken while still queued: let everyone ahead of us go too
            let ahead = {
                let mut waiters = self.waiters.borrow_mut();
                match waiters.iter().position(|t| *t == me) {
                    Some(pos) => {
                        let ahead: Vec<Thread> = waiters.drain(..pos).collect();
                        waiters.pop_front();
                        ahead
                    }
                    None => Vec::new(),
                }
            };
            for t in ahead {
                scheduler::make_runnable(t);
            }
            mutex
        };
        mutex.lock()
    }

    /// Wake the oldest waiter
    pub fn signal(&self) {
        let _mask = interrupt::disable();
        loop {
            let next = self.waiters.borrow_mut().pop_front();
            match next {
                Some(t) if scheduler::make_runnable(t) => return,
                Some(_) => continue,
                None => return,
            }
        }
    }

    /// Wake every waiter, oldest first
    pub fn broadcast(&self) {
        let _mask = interrupt::disable();
        let all: Vec<Thread> = self.waiters.borrow_mut().drain(..).collect();
        for t in all {
            scheduler::make_runnable(t);
        }
    }

    /// Threads parked on this condition
    pub fn waiters(&self) -> usize {
        self.waiters.borrow().len()
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        let left = self.waiters.get_mut().len();
        if left > 0 {
            kwarn!("condition variable dropped with {} parked threads", left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{join, spawn, SpawnOptions};
    use std::rc::Rc;

    #[test]
    fn test_signal_without_waiters() {
        let cv = Condvar::new();
        cv.signal();
        cv.broadcast();
        assert_eq!(cv.waiters(), 0);
    }

    #[test]
    fn test_wait_and_signal() {
        let state = Rc::new((Mutex::new(false), Condvar::new()));

        let s = state.clone();
        let t = spawn(
            Box::new(move || {
                let (m, cv) = &*s;
                let mut ready = m.lock().unwrap();
                while !*ready {
                    ready = cv.wait(ready).unwrap();
                }
                None
            }),
            SpawnOptions::default(),
        )
        .unwrap();

        scheduler::yield_now();
        let (m, cv) = &*state;
        assert_eq!(cv.waiters(), 1);
        assert_eq!(scheduler::thread_state(t), Some(ThreadState::BlockedInSync));
        assert!(!m.is_locked());

        *m.lock().unwrap() = true;
        cv.signal();
        assert_eq!(cv.waiters(), 0);
        join(t).unwrap();
    }

    #[test]
    fn test_broadcast_wakes_in_order() {
        let state = Rc::new((Mutex::new(Vec::new()), Condvar::new()));
        let mut threads = Vec::new();
        for i in 0..3 {
            let s = state.clone();
            threads.push(
                spawn(
                    Box::new(move || {
                        let (m, cv) = &*s;
                        let g = m.lock().unwrap();
                        let mut g = cv.wait(g).unwrap();
                        g.push(i);
                        None
                    }),
                    SpawnOptions::default(),
                )
                .unwrap(),
            );
        }

        scheduler::yield_now();
        let (m, cv) = &*state;
        assert_eq!(cv.waiters(), 3);
        cv.broadcast();
        for t in threads {
            join(t).unwrap();
        }
        assert_eq!(*m.lock().unwrap(), vec![0, 1, 2]);
    }
}
