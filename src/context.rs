//! Handles the engine passes into user callbacks.
//!
//! An [`Emitter`] exists only for the duration of the map phase and is the
//! single way a map function records keys. A [`ValuePuller`] exists only
//! inside a reduce callback and is the single way it consumes occurrences;
//! its `&mut` borrow of the partition's tree is what makes lock-free pulls
//! sound.

use crate::partition::PartitionTable;
use crate::tree::KeyTree;
use crate::PartitionFn;

/// Map-phase handle for recording key occurrences.
///
/// Shared by reference across all mapper threads; [`Emitter::emit`] may be
/// called concurrently any number of times.
pub struct Emitter<'a> {
    table: &'a PartitionTable,
    partitioner: &'a PartitionFn,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(table: &'a PartitionTable, partitioner: &'a PartitionFn) -> Self {
        Self { table, partitioner }
    }

    /// Record one occurrence of `key` in the partition selected by the
    /// run's partitioning function.
    ///
    /// The value payload is accepted for interface compatibility but not
    /// retained: the engine tracks occurrence counts of keys only.
    ///
    /// # Panics
    ///
    /// Panics if the partitioning function violates its contract by
    /// returning an id outside `[0, partitions)`. This aborts the run.
    pub fn emit(&self, key: &str, value: &str) {
        let _ = value;
        let partitions = self.table.len();
        let id = (self.partitioner)(key, partitions);
        assert!(
            id < partitions,
            "partitioner returned id {id} for {partitions} partitions"
        );
        self.table.partition(id).record(key);
    }
}

/// Reduce-phase handle for consuming the occurrences of the delivered key.
pub struct ValuePuller<'a> {
    tree: &'a mut KeyTree,
    partition: usize,
}

impl<'a> ValuePuller<'a> {
    pub(crate) fn new(tree: &'a mut KeyTree, partition: usize) -> Self {
        Self { tree, partition }
    }

    /// Consume one occurrence of `key`.
    ///
    /// Returns `true` while occurrences remain; returns `false`, mutating
    /// nothing, once `key` is exhausted (or was never the key currently
    /// being delivered). A reduce callback is expected to call this until
    /// it reports exhaustion for the key it was handed.
    pub fn pull(&mut self, key: &str) -> bool {
        self.tree.pull(key)
    }

    /// Id of the partition this reduce callback is draining.
    pub fn partition(&self) -> usize {
        self.partition
    }
}
