use std::cmp::Reverse;
use std::hash::Hash;
use std::sync::Mutex;

use priority_queue::PriorityQueue;

/// Keeps the set of values currently eligible for eviction, ordered by how
/// recently each was inserted.
///
/// Recency is a logical tick incremented on every insert, so no two entries
/// ever tie and an insert always makes its value strictly the most recent.
pub struct LruReplacer<T: Hash + Eq + Copy> {
    inner: Mutex<RecencyQueue<T>>,
}

struct RecencyQueue<T: Hash + Eq> {
    entries: PriorityQueue<T, Reverse<u64>>,
    next_tick: u64,
}

impl<T: Hash + Eq + Copy> LruReplacer<T> {
    /// Allocates a new replacer sized for `capacity` entries.
    pub fn new(capacity: usize) -> LruReplacer<T> {
        LruReplacer {
            inner: Mutex::new(RecencyQueue {
                entries: PriorityQueue::with_capacity(capacity),
                next_tick: 0,
            }),
        }
    }

    /// Makes `value` the most recent entry, inserting it if it is absent and
    /// promoting it if it is already present.
    pub fn insert(&self, value: T) {
        let mut queue = self.inner.lock().unwrap();
        let tick = queue.next_tick;
        queue.next_tick += 1;
        queue.entries.push(value, Reverse(tick));
    }

    /// Removes and returns the least recently inserted value.
    /// If nothing is evictable, [None] is returned.
    pub fn victim(&self) -> Option<T> {
        let mut queue = self.inner.lock().unwrap();
        queue.entries.pop().map(|(value, _)| value)
    }

    /// Drops `value` from the queue and returns whether it was present.
    pub fn erase(&self, value: &T) -> bool {
        let mut queue = self.inner.lock().unwrap();
        queue.entries.remove(value).is_some()
    }

    /// Returns the current number of evictable values.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[cfg(test)]
mod lru_tests {
    use super::LruReplacer;

    #[test]
    fn erase_nonexisting() {
        let replacer: LruReplacer<usize> = LruReplacer::new(10);

        assert!(!replacer.erase(&0));
    }

    #[test]
    fn erase_existing() {
        let replacer = LruReplacer::new(10);
        replacer.insert(0usize);

        assert!(replacer.erase(&0));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn usual_get_victim() {
        let replacer = LruReplacer::new(10);

        replacer.insert(0usize);
        replacer.insert(2);
        replacer.insert(1);

        assert_eq!(replacer.victim(), Some(0));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn reinsert_promotes() {
        let replacer = LruReplacer::new(10);

        replacer.insert(1usize);
        replacer.insert(2);
        replacer.insert(3);
        replacer.insert(1);

        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), Some(1));
    }

    #[test]
    fn size_counts_entries() {
        let replacer = LruReplacer::new(7);
        for frame_id in 1usize..=6 {
            replacer.insert(frame_id);
        }

        assert_eq!(replacer.size(), 6);
    }
}
