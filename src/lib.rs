//! # mapred
//!
//! An embeddable multi-threaded MapReduce engine.
//!
//! The caller supplies a map function, a reduce function, a key-partitioning
//! function, and the desired parallelism. The engine splits input locations
//! across mapper threads, accumulates every emitted key into one ordered
//! multiset per partition, and then drives reducer threads that replay each
//! partition's keys in ascending lexicographic order with exact per-key
//! occurrence counts.
//!
//! ## Guarantees
//!
//! - A key's final count equals the number of times it was emitted, no
//!   matter how mapper threads interleave.
//! - Within a partition, keys are delivered in strictly ascending
//!   lexicographic order, one reduce invocation per distinct key.
//! - A partition is only ever touched by the single reducer thread it was
//!   assigned to.
//!
//! ## Architecture
//!
//! Each partition owns an unbalanced binary search tree of key nodes with
//! occurrence counts, guarded by a mutex, plus a lock-free increment path
//! for the partition's most frequent key. The two phases are separated by a
//! full barrier: insertion happens only while mappers run, removal only
//! while reducers run, and that temporal split is what makes the unlocked
//! fast path sound.
//!
//! ## Example
//!
//! ```rust
//! use mapred::{Config, MapReduce};
//!
//! let engine = MapReduce::new(Config::default());
//! let docs = vec!["the quick brown fox".to_string(), "the lazy dog".to_string()];
//! engine
//!     .run(
//!         &docs,
//!         |emitter, doc| {
//!             for word in doc.split_whitespace() {
//!                 emitter.emit(word, "1");
//!             }
//!         },
//!         |key, puller| {
//!             let mut count = 0;
//!             while puller.pull(key) {
//!                 count += 1;
//!             }
//!             if key == "the" {
//!                 assert_eq!(count, 2);
//!             }
//!         },
//!     )
//!     .unwrap();
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod context;
mod error;
mod partition;
mod scheduler;
mod tree;

#[cfg(test)]
mod proptests;

pub use context::{Emitter, ValuePuller};
pub use error::Error;

/// Key-partitioning function: maps a key and the partition count to a
/// partition id in `[0, partitions)`. Must be deterministic and a pure
/// function of its inputs.
pub type PartitionFn = dyn Fn(&str, usize) -> usize + Sync;

/// Parallelism and partitioning parameters for one run.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of key partitions.
    pub partitions: usize,
    /// Number of mapper threads.
    pub mappers: usize,
    /// Number of reducer threads.
    pub reducers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            partitions: 16,
            mappers: 4,
            reducers: 4,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partition count must be non-zero"));
        }
        if self.mappers == 0 {
            return Err(Error::InvalidConfig("mapper count must be non-zero"));
        }
        if self.reducers == 0 {
            return Err(Error::InvalidConfig("reducer count must be non-zero"));
        }
        Ok(())
    }
}

/// Default key partitioner: DJB2 hash of the key, modulo the partition count.
pub fn default_partition(key: &str, partitions: usize) -> usize {
    let mut hash: u64 = 5381;
    for byte in key.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    (hash % partitions as u64) as usize
}

/// A configured MapReduce engine.
///
/// Owns its partitioning function and configuration; all run state lives
/// inside [`MapReduce::run`], so one process may drive any number of engines
/// (or repeated runs of the same engine) without interference.
pub struct MapReduce {
    config: Config,
    partitioner: Box<PartitionFn>,
}

impl MapReduce {
    /// Create an engine with [`default_partition`] as its partitioner.
    pub fn new(config: Config) -> Self {
        Self::with_partitioner(config, default_partition)
    }

    /// Create an engine with a caller-supplied partitioning function.
    pub fn with_partitioner<P>(config: Config, partitioner: P) -> Self
    where
        P: Fn(&str, usize) -> usize + Sync + 'static,
    {
        Self {
            config,
            partitioner: Box::new(partitioner),
        }
    }

    /// Execute a full map + reduce run over `inputs`, blocking until every
    /// phase has completed.
    ///
    /// `map_fn` is invoked once per input location on a mapper thread and
    /// records keys through the [`Emitter`]. `reduce_fn` is invoked once per
    /// distinct key on a reducer thread and must call [`ValuePuller::pull`]
    /// until it reports exhaustion for that key.
    ///
    /// A panic in either callback aborts the run. There are no retries and
    /// no partial results.
    pub fn run<S, M, R>(&self, inputs: &[S], map_fn: M, reduce_fn: R) -> Result<(), Error>
    where
        S: AsRef<str> + Sync,
        M: Fn(&Emitter<'_>, &str) + Sync,
        R: Fn(&str, &mut ValuePuller<'_>) + Sync,
    {
        scheduler::execute(&self.config, &*self.partitioner, inputs, map_fn, reduce_fn)
    }
}
