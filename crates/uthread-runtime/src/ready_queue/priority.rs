//! Multi-level priority ready queue
//!
//! `MAX_PRIORITY` FIFO levels. Selection scans from the highest level down
//! and takes the head of the first non-empty one. Each reschedule decays the
//! thread one level, wrapping from the lowest back to the highest, so a
//! thread that keeps yielding cannot monopolise the top level.

use std::collections::VecDeque;

use super::ReadyQueue;
use crate::config::SchedPolicy;
use crate::thread::Thread;
use uthread_core::state::Priority;

#[derive(Debug)]
pub struct PriorityQueue {
    levels: Vec<VecDeque<Thread>>,
    len: usize,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            levels: (0..Priority::COUNT).map(|_| VecDeque::new()).collect(),
            len: 0,
        }
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyQueue for PriorityQueue {
    fn push_back(&mut self, thread: Thread, priority: Priority) {
        self.levels[priority.as_index()].push_back(thread);
        self.len += 1;
    }

    fn push_front(&mut self, thread: Thread, priority: Priority) {
        self.levels[priority.as_index()].push_front(thread);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<Thread> {
        let thread = self.levels.iter_mut().rev().find_map(VecDeque::pop_front)?;
        self.len -= 1;
        Some(thread)
    }

    fn remove(&mut self, thread: Thread, priority: Priority) -> bool {
        let level = &mut self.levels[priority.as_index()];
        match level.iter().position(|t| *t == thread) {
            Some(idx) => {
                level.remove(idx);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn reserve(&mut self, additional: usize) {
        // A thread can land on any level
        for level in &mut self.levels {
            level.reserve(additional);
        }
    }

    fn decay(&self, priority: Priority) -> Priority {
        priority.decayed()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn policy(&self) -> SchedPolicy {
        SchedPolicy::Priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uthread_core::ThreadId;

    fn t(n: u64) -> Thread {
        Thread::from_parts(ThreadId::new(n), n as u32)
    }

    fn p(level: u8) -> Priority {
        Priority::new(level).unwrap()
    }

    #[test]
    fn test_highest_level_first() {
        let mut q = PriorityQueue::new();
        q.push_back(t(1), p(2));
        q.push_back(t(2), p(7));
        q.push_back(t(3), p(7));
        q.push_back(t(4), p(9));

        assert_eq!(q.len(), 4);
        assert_eq!(q.pop(), Some(t(4)));
        assert_eq!(q.pop(), Some(t(2)));
        assert_eq!(q.pop(), Some(t(3)));
        assert_eq!(q.pop(), Some(t(1)));
        assert_eq!(q.pop(), None);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_push_front_within_level() {
        let mut q = PriorityQueue::new();
        q.push_back(t(1), p(5));
        q.push_front(t(2), p(5));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(t(2)));
    }

    #[test]
    fn test_remove_from_level() {
        let mut q = PriorityQueue::new();
        q.push_back(t(1), p(3));
        assert!(!q.remove(t(1), p(4)));
        assert!(q.remove(t(1), p(3)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_decay_lets_fresh_thread_win() {
        let mut q = PriorityQueue::new();
        // t1 has yielded once, t2 has never run
        let yielded = q.decay(Priority::HIGHEST);
        q.push_back(t(2), Priority::HIGHEST);
        q.push_back(t(1), yielded);
        assert_eq!(q.pop(), Some(t(2)));
        assert_eq!(q.policy(), SchedPolicy::Priority);
    }
}
