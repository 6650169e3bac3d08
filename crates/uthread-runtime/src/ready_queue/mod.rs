//! Ready queue abstraction for green thread scheduling
//!
//! The scheduling policy is chosen once, when the runtime starts, and the
//! lifecycle manager talks to it only through [`ReadyQueue`].
//!
//! # Implementations
//! - `FifoQueue` - one run queue, strict arrival order
//! - `PriorityQueue` - one run queue per priority level, highest level first

mod fifo;
mod priority;

pub use fifo::FifoQueue;
pub use priority::PriorityQueue;

use uthread_core::state::Priority;

use crate::config::SchedPolicy;
use crate::thread::Thread;

/// Trait for ready queue implementations
///
/// The running thread is never in the queue. Pushes must not allocate once
/// `reserve` has been called for every thread that can be queued, because the
/// preemption path pushes from a signal handler.
pub trait ReadyQueue {
    /// Append at the tail of the thread's level
    fn push_back(&mut self, thread: Thread, priority: Priority);

    /// Insert at the head of the thread's level (joiner hand-off)
    fn push_front(&mut self, thread: Thread, priority: Priority);

    /// Remove and return the next thread to run
    fn pop(&mut self) -> Option<Thread>;

    /// Remove a specific thread; returns whether it was queued
    fn remove(&mut self, thread: Thread, priority: Priority) -> bool;

    /// Ensure room for `additional` more pushes without reallocating
    fn reserve(&mut self, additional: usize);

    /// Priority a thread gets when it is rescheduled
    fn decay(&self, priority: Priority) -> Priority;

    /// Number of queued threads
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Policy this queue implements
    fn policy(&self) -> SchedPolicy;
}

/// Create the queue for a policy
pub fn new_ready_queue(policy: SchedPolicy) -> Box<dyn ReadyQueue> {
    match policy {
        SchedPolicy::Fifo => Box::new(FifoQueue::new()),
        SchedPolicy::Priority => Box::new(PriorityQueue::new()),
    }
}
