//! Thread records and the table that owns them
//!
//! Threads refer to each other (joiner, join target) by [`Thread`] handle,
//! an index into the table paired with the thread's never-reused id. A handle
//! whose id no longer matches its slot is stale and every lookup through it
//! fails cleanly instead of touching a recycled record.

use std::any::Any;
use std::fmt;

use uthread_core::{Priority, ThreadId, ThreadState};

use crate::context::Context;
use crate::signal::Mailbox;

/// Value a thread leaves behind for its joiner
pub type ExitValue = Box<dyn Any>;

/// Body of a green thread
pub type Entry = Box<dyn FnOnce() -> Option<ExitValue>>;

/// Copyable handle to a green thread
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thread {
    id: ThreadId,
    slot: u32,
}

impl Thread {
    pub(crate) const fn from_parts(id: ThreadId, slot: u32) -> Self {
        Self { id, slot }
    }

    /// Stable identity of this thread
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.id)
    }
}

/// Everything the scheduler knows about one green thread
pub(crate) struct ThreadControlBlock {
    pub id: ThreadId,
    pub context: Context,
    pub state: ThreadState,
    pub priority: Priority,
    /// Set once, by the thread itself, on exit
    pub retval: Option<ExitValue>,
    /// The thread blocked joining this one
    pub joiner: Option<Thread>,
    /// The thread this one is blocked joining
    pub waiting_on: Option<Thread>,
    /// Root of the join chain this thread is part of
    pub wait_origin: Option<ThreadId>,
    /// Mutexes currently held; yields are suppressed while non-zero
    pub locks_held: u32,
    pub mailbox: Mailbox,
    /// Taken by the entry trampoline on first dispatch
    pub entry: Option<Entry>,
}

impl ThreadControlBlock {
    pub fn new(id: ThreadId, context: Context, priority: Priority, entry: Option<Entry>) -> Self {
        Self {
            id,
            context,
            state: ThreadState::Runnable,
            priority,
            retval: None,
            joiner: None,
            waiting_on: None,
            wait_origin: None,
            locks_held: 0,
            mailbox: Mailbox::new(),
            entry,
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.is_terminated()
    }

    #[inline]
    pub fn holds_lock(&self) -> bool {
        self.locks_held > 0
    }
}

/// Arena of thread records
///
/// Records are boxed so the register block inside each context keeps its
/// address while the slot vector grows.
pub(crate) struct ThreadTable {
    slots: Vec<Option<Box<ThreadControlBlock>>>,
    free: Vec<u32>,
    next_id: ThreadId,
    len: usize,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_id: ThreadId::BOOTSTRAP,
            len: 0,
        }
    }

    /// Id the next inserted thread will receive
    pub fn next_id(&self) -> ThreadId {
        self.next_id
    }

    /// Slot the next inserted thread will occupy
    pub fn next_slot(&self) -> u32 {
        self.free.last().copied().unwrap_or(self.slots.len() as u32)
    }

    /// Store a record built for `next_id()`/`next_slot()`
    pub fn insert(&mut self, tcb: ThreadControlBlock) -> Thread {
        debug_assert_eq!(tcb.id, self.next_id);
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                (self.slots.len() - 1) as u32
            }
        };
        let handle = Thread::from_parts(tcb.id, slot);
        self.slots[slot as usize] = Some(Box::new(tcb));
        self.next_id = self.next_id.next();
        self.len += 1;
        handle
    }

    pub fn get(&self, thread: Thread) -> Option<&ThreadControlBlock> {
        self.slots
            .get(thread.slot())?
            .as_deref()
            .filter(|tcb| tcb.id == thread.id)
    }

    pub fn get_mut(&mut self, thread: Thread) -> Option<&mut ThreadControlBlock> {
        self.slots
            .get_mut(thread.slot())?
            .as_deref_mut()
            .filter(|tcb| tcb.id == thread.id)
    }

    /// Take a record out of the table, recycling its slot
    pub fn remove(&mut self, thread: Thread) -> Option<Box<ThreadControlBlock>> {
        self.get(thread)?;
        let tcb = self.slots[thread.slot()].take()?;
        self.free.push(thread.slot);
        self.len -= 1;
        Some(tcb)
    }

    /// Number of records (live, blocked or done-but-unjoined)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Drop every record, unmapping their stacks
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(table: &ThreadTable) -> ThreadControlBlock {
        ThreadControlBlock::new(table.next_id(), Context::bootstrap(), Priority::HIGHEST, None)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = ThreadTable::new();
        let a = table.insert(record(&table));
        let b = table.insert(record(&table));

        assert_eq!(a.id(), ThreadId::BOOTSTRAP);
        assert_eq!(b.id(), ThreadId::new(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b).map(|t| t.state), Some(ThreadState::Runnable));
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut table = ThreadTable::new();
        let _boot = table.insert(record(&table));
        let old = table.insert(record(&table));
        assert!(table.remove(old).is_some());
        assert!(table.remove(old).is_none());

        assert_eq!(table.next_slot() as usize, old.slot());
        let new = table.insert(record(&table));
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new.id(), old.id());
        assert!(table.get(old).is_none());
        assert!(table.get_mut(new).is_some());
    }

    #[test]
    fn test_handle_debug() {
        let t = Thread::from_parts(ThreadId::new(5), 2);
        assert_eq!(format!("{:?}", t), "Thread(5)");
    }
}
