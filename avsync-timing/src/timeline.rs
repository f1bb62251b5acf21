use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// An event popped from the timeline together with the time it was due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled<E> {
    pub due_ns: u64,
    pub event: E,
}

struct Entry<E> {
    due_ns: u64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ns
            .cmp(&other.due_ns)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Pending delayed callbacks on a single logical timeline.
///
/// Events come out in due order; events due at the same instant come out in
/// the order they were scheduled.
pub struct Timeline<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    next_seq: u64,
}

impl<E> Timeline<E> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule_at(&mut self, due_ns: u64, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due_ns, seq, event }));
    }

    /// Removes and returns the earliest event due at or before `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<Scheduled<E>> {
        if self.next_due()? > now_ns {
            return None;
        }
        self.queue.pop().map(|Reverse(entry)| Scheduled {
            due_ns: entry.due_ns,
            event: entry.event,
        })
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(entry)| entry.due_ns)
    }

    /// Drops every pending event and returns how many were cancelled.
    pub fn clear(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        cancelled
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E> Default for Timeline<E> {
    fn default() -> Self {
        Self::new()
    }
}
