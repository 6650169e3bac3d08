//! Single-level FIFO ready queue

use std::collections::VecDeque;

use super::ReadyQueue;
use crate::config::SchedPolicy;
use crate::thread::Thread;
use uthread_core::state::Priority;

/// One run queue; priorities are accepted and ignored
#[derive(Debug, Default)]
pub struct FifoQueue {
    queue: VecDeque<Thread>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadyQueue for FifoQueue {
    fn push_back(&mut self, thread: Thread, _priority: Priority) {
        self.queue.push_back(thread);
    }

    fn push_front(&mut self, thread: Thread, _priority: Priority) {
        self.queue.push_front(thread);
    }

    fn pop(&mut self) -> Option<Thread> {
        self.queue.pop_front()
    }

    fn remove(&mut self, thread: Thread, _priority: Priority) -> bool {
        match self.queue.iter().position(|t| *t == thread) {
            Some(idx) => {
                self.queue.remove(idx);
                true
            }
            None => false,
        }
    }

    fn reserve(&mut self, additional: usize) {
        self.queue.reserve(additional);
    }

    fn decay(&self, priority: Priority) -> Priority {
        priority
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn policy(&self) -> SchedPolicy {
        SchedPolicy::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uthread_core::ThreadId;

    fn t(n: u64) -> Thread {
        Thread::from_parts(ThreadId::new(n), n as u32)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = FifoQueue::new();
        q.push_back(t(1), Priority::LOWEST);
        q.push_back(t(2), Priority::HIGHEST);
        q.push_back(t(3), Priority::LOWEST);

        assert_eq!(q.pop(), Some(t(1)));
        assert_eq!(q.pop(), Some(t(2)));
        assert_eq!(q.pop(), Some(t(3)));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_front_jumps_queue() {
        let mut q = FifoQueue::new();
        q.push_back(t(1), Priority::HIGHEST);
        q.push_front(t(2), Priority::LOWEST);
        assert_eq!(q.pop(), Some(t(2)));
    }

    #[test]
    fn test_remove() {
        let mut q = FifoQueue::new();
        q.push_back(t(1), Priority::HIGHEST);
        q.push_back(t(2), Priority::HIGHEST);
        assert!(q.remove(t(1), Priority::HIGHEST));
        assert!(!q.remove(t(1), Priority::HIGHEST));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_no_decay() {
        let q = FifoQueue::new();
        assert_eq!(q.decay(Priority::HIGHEST), Priority::HIGHEST);
        assert_eq!(q.policy(), SchedPolicy::Fifo);
    }
}
