//! Commit bookkeeping for partitioned task sources.
//!
//! Batches can be acknowledged out of order (a batch holding a deferred
//! retry is acknowledged after later ones) or rejected outright. The tracker
//! only lets a partition's committed position advance up to its oldest
//! delivered offset that has not been acknowledged, so a restart always
//! re-reads every task that did not finish.

use std::collections::{BTreeSet, HashMap};

use crate::queue::messages::Offset;

#[derive(Debug, Default)]
struct PartitionState {
    /// Delivered offsets still waiting for a successful acknowledgment.
    in_flight: BTreeSet<i64>,
    /// Offsets that were rejected and have not been seen again since.
    rejected: BTreeSet<i64>,
    highest_acknowledged: Option<i64>,
    /// Next offset to read as of the last commit. Starts at the first
    /// offset delivered from the partition.
    committed: Option<i64>,
}

impl PartitionState {
    /// The position that may be committed now, if it moved forward.
    fn advance(&mut self) -> Option<i64> {
        let next = match self.in_flight.first() {
            Some(oldest) => *oldest,
            None => self.highest_acknowledged? + 1,
        };
        if self.committed.is_some_and(|committed| committed >= next) {
            return None;
        }
        self.committed = Some(next);
        Some(next)
    }
}

/// Tracks delivered, acknowledged and rejected offsets per partition.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<(String, i32), PartitionState>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&mut self, topic: &str, partition: i32) -> &mut PartitionState {
        self.partitions
            .entry((topic.to_string(), partition))
            .or_default()
    }

    /// Record offsets handed to the orchestrator.
    pub fn delivered(&mut self, offsets: &[Offset]) {
        for (topic, partition, offset) in offsets {
            let state = self.partition(topic, *partition);
            state.committed.get_or_insert(*offset);
            state.in_flight.insert(*offset);
            state.rejected.remove(offset);
        }
    }

    /// Record a successful acknowledgment.
    ///
    /// Returns the `(topic, partition, next offset)` positions to commit.
    pub fn acknowledged(&mut self, offsets: &[Offset]) -> Vec<Offset> {
        let mut touched = BTreeSet::new();
        for (topic, partition, offset) in offsets {
            let state = self.partition(topic, *partition);
            state.in_flight.remove(offset);
            state.highest_acknowledged = state.highest_acknowledged.max(Some(*offset));
            touched.insert((topic.clone(), *partition));
        }

        touched
            .into_iter()
            .filter_map(|(topic, partition)| {
                let next = self.partition(&topic, partition).advance()?;
                Some((topic, partition, next))
            })
            .collect()
    }

    /// Record a rejected batch. Its offsets stay uncommitted until they are
    /// delivered and acknowledged again.
    ///
    /// Returns the lowest rejected offset per partition, where the consumer
    /// has to resume reading.
    pub fn rejected(&mut self, offsets: &[Offset]) -> Vec<Offset> {
        let mut touched = BTreeSet::new();
        for (topic, partition, offset) in offsets {
            let state = self.partition(topic, *partition);
            state.in_flight.insert(*offset);
            state.rejected.insert(*offset);
            touched.insert((topic.clone(), *partition));
        }

        touched
            .into_iter()
            .filter_map(|(topic, partition)| {
                let lowest = *self.partition(&topic, partition).rejected.first()?;
                Some((topic, partition, lowest))
            })
            .collect()
    }
}
