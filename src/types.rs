//! Shared container types.

use std::{collections::VecDeque, hash::Hash};

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered map. Deterministic iteration keeps state numbering and
/// table layout reproducible across runs.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;

/// Insertion-ordered set.
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

/// A FIFO work-list that ignores pushes of elements already pending.
#[derive(Debug)]
pub struct Queue<T> {
    queue: VecDeque<T>,
    pending: Set<T>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            pending: Set::default(),
        }
    }
}

impl<T> Queue<T>
where
    T: Clone + Eq + Hash,
{
    pub fn push(&mut self, value: T) {
        if self.pending.insert(value.clone()) {
            self.queue.push_back(value);
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let value = self.queue.pop_front()?;
        self.pending.remove(&value);
        Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_deduplicates_pending_entries() {
        let mut queue = Queue::default();
        queue.push(1u32);
        queue.push(2);
        queue.push(1);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);

        // an element may be re-queued once it has been popped
        queue.push(1);
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.is_empty());
    }
}
