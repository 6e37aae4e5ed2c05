//! Per-partition concurrency control and the partition table.
//!
//! Every partition pairs its key tree with a mutex and a lock-free cache of
//! the partition's most frequent entry. During the map phase, an emitted key
//! that matches the cached entry is counted with a bare atomic add; every
//! other mutation serializes through the mutex. During the reduce phase a
//! single thread drains the tree through the mutex guard, so pulls need no
//! further synchronization.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::tree::{KeyEntry, KeyTree};

/// One partition: an ordered multiset of keys plus its concurrency control.
pub(crate) struct Partition {
    tree: Mutex<KeyTree>,
    /// Entry with the highest occurrence count in this partition, published
    /// by locked inserts and read without the lock by `record`. Null until
    /// the first key lands.
    frequent: AtomicPtr<KeyEntry>,
}

impl Partition {
    fn new() -> Self {
        Self {
            tree: Mutex::new(KeyTree::new()),
            frequent: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Record one occurrence of `key`. Safe to call concurrently from any
    /// number of mapper threads, and only from mapper threads.
    ///
    /// Fast path: if `key` matches the published most-frequent entry, bump
    /// its count with an atomic add and skip the lock. A concurrent update
    /// of the published entry can at worst make one call miss the fast path
    /// and fall through to the locked insert.
    pub(crate) fn record(&self, key: &str) {
        let published = self.frequent.load(Ordering::Acquire);
        if !published.is_null() {
            // SAFETY: entries are freed only by the drain stage, which the
            // scheduler starts strictly after every mapper thread (the only
            // callers of `record`) has been joined. During the map phase the
            // entry behind `published` is therefore live, at a stable
            // address, and mutated only through its atomic count.
            let entry = unsafe { &*published };
            if *entry.key == *key {
                entry.count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut tree = self.tree.lock();
        let frequent = tree.insert(key);
        self.frequent.store(frequent.cast_mut(), Ordering::Release);
    }

    /// True once at least one key has been recorded and not yet drained.
    pub(crate) fn is_occupied(&self) -> bool {
        !self.tree.lock().is_empty()
    }

    /// Take exclusive hold of the tree for the drain stage: retire the
    /// fast-path cache and place the cursor on the smallest key.
    pub(crate) fn begin_reduce(&self) -> MutexGuard<'_, KeyTree> {
        self.frequent.store(ptr::null_mut(), Ordering::Release);
        let mut tree = self.tree.lock();
        tree.reset_cursor();
        tree
    }
}

/// All partitions of one run, indexed by partition id.
pub(crate) struct PartitionTable {
    partitions: Box<[Partition]>,
}

impl PartitionTable {
    pub(crate) fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions).map(|_| Partition::new()).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.partitions.len()
    }

    pub(crate) fn partition(&self, id: usize) -> &Partition {
        &self.partitions[id]
    }

    /// Ids of partitions that received at least one key, in ascending order.
    pub(crate) fn occupied_ids(&self) -> Vec<usize> {
        (0..self.partitions.len())
            .filter(|&id| self.partitions[id].is_occupied())
            .collect()
    }
}
