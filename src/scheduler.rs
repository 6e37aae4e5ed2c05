//! Two-phase worker-pool orchestration.
//!
//! The scheduler owns a run from start to finish: it allocates the partition
//! table, splits inputs statically across mapper threads, joins them all (the
//! barrier that separates accumulation from draining), splits the occupied
//! partitions statically across reducer threads, and joins those. Task
//! assignments are contiguous chunks of size `ceil(total / workers)`; there
//! is no work stealing or rebalancing after assignment.

use std::thread;

use log::{debug, trace};

use crate::context::{Emitter, ValuePuller};
use crate::partition::{Partition, PartitionTable};
use crate::{Config, Error, PartitionFn};

/// Static assignment for one mapper thread.
struct MapTask<'a, S> {
    id: usize,
    locations: &'a [S],
}

/// Static assignment for one reducer thread.
struct ReduceTask<'a> {
    id: usize,
    partitions: &'a [usize],
}

/// Drive a full map + reduce run to completion.
pub(crate) fn execute<S, M, R>(
    config: &Config,
    partitioner: &PartitionFn,
    inputs: &[S],
    map_fn: M,
    reduce_fn: R,
) -> Result<(), Error>
where
    S: AsRef<str> + Sync,
    M: Fn(&Emitter<'_>, &str) + Sync,
    R: Fn(&str, &mut ValuePuller<'_>) + Sync,
{
    config.validate()?;
    let table = PartitionTable::new(config.partitions);

    debug!(
        "map phase: {} inputs across up to {} mappers",
        inputs.len(),
        config.mappers
    );
    if !inputs.is_empty() {
        let tasks: Vec<MapTask<'_, S>> = inputs
            .chunks(inputs.len().div_ceil(config.mappers))
            .enumerate()
            .map(|(id, locations)| MapTask { id, locations })
            .collect();
        thread::scope(|scope| {
            for task in tasks {
                let emitter = Emitter::new(&table, partitioner);
                let map_fn = &map_fn;
                scope.spawn(move || {
                    trace!("mapper {}: {} locations", task.id, task.locations.len());
                    for location in task.locations {
                        map_fn(&emitter, location.as_ref());
                    }
                });
            }
        });
        // The scope only returns once every mapper thread has been joined;
        // from here on no thread can reach the emission path.
    }

    let occupied = table.occupied_ids();
    debug!(
        "reduce phase: {} occupied partitions across up to {} reducers",
        occupied.len(),
        config.reducers
    );
    if !occupied.is_empty() {
        let tasks: Vec<ReduceTask<'_>> = occupied
            .chunks(occupied.len().div_ceil(config.reducers))
            .enumerate()
            .map(|(id, partitions)| ReduceTask { id, partitions })
            .collect();
        thread::scope(|scope| {
            for task in tasks {
                let table = &table;
                let reduce_fn = &reduce_fn;
                scope.spawn(move || {
                    trace!("reducer {}: partitions {:?}", task.id, task.partitions);
                    for &id in task.partitions {
                        drain_partition(table.partition(id), id, reduce_fn);
                    }
                });
            }
        });
    }

    debug!("run complete");
    Ok(())
}

/// Deliver every remaining key of one partition to the reduce callback, in
/// ascending order, then release the partition's storage.
///
/// The callback is invoked once per distinct key and is expected to pull
/// until exhaustion; a callback that never pulls would be re-invoked with
/// the same key forever, mirroring the calling contract of the interface.
fn drain_partition<R>(partition: &Partition, id: usize, reduce_fn: &R)
where
    R: Fn(&str, &mut ValuePuller<'_>),
{
    let mut tree = partition.begin_reduce();
    while let Some(key) = tree.cursor_key().map(String::from) {
        let mut puller = ValuePuller::new(&mut tree, id);
        reduce_fn(&key, &mut puller);
    }
    tree.clear();
}
