//! Retries delivered before their `not_before`.
//!
//! They wait here instead of blocking the batch they arrived in. The batch's
//! acknowledgment is held until each of its deferred tasks has run.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::queue::{Offset, StreamMessage, TaskEnvelope};

struct HeldBatch {
    offsets: Vec<Offset>,
    outstanding: usize,
    error: Option<String>,
}

#[derive(Default)]
pub(crate) struct DeferredTasks {
    next_batch: u64,
    waiting: Vec<(Instant, u64, TaskEnvelope)>,
    held: HashMap<u64, HeldBatch>,
}

impl DeferredTasks {
    /// Park `envelopes` and hold the acknowledgment of the batch that
    /// delivered them.
    pub(crate) fn hold(&mut self, offsets: Vec<Offset>, envelopes: Vec<TaskEnvelope>) {
        let batch = self.next_batch;
        self.next_batch += 1;

        let now = Instant::now();
        self.held.insert(
            batch,
            HeldBatch {
                offsets,
                outstanding: envelopes.len(),
                error: None,
            },
        );
        for envelope in envelopes {
            let due = now + envelope.remaining_delay().unwrap_or_default();
            self.waiting.push((due, batch, envelope));
        }
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.waiting.iter().map(|(due, _, _)| *due).min()
    }

    /// Remove and return the tasks due by `now`, tagged with their batch.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<(u64, TaskEnvelope)> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiting)
            .into_iter()
            .partition(|(due, _, _)| *due <= now);
        self.waiting = waiting;
        due.into_iter()
            .map(|(_, batch, envelope)| (batch, envelope))
            .collect()
    }

    /// Record that one deferred task of `batch` finished.
    ///
    /// Returns the batch's acknowledgment once none of its tasks is
    /// outstanding. Any error rejects the whole batch.
    pub(crate) fn finish(&mut self, batch: u64, error: Option<String>) -> Option<StreamMessage> {
        let held = self.held.get_mut(&batch)?;
        held.outstanding = held.outstanding.saturating_sub(1);
        if held.error.is_none() {
            held.error = error;
        }
        if held.outstanding > 0 {
            return None;
        }

        let held = self.held.remove(&batch)?;
        Some(StreamMessage::Acknowledgment {
            offsets: held.offsets,
            success: held.error.is_none(),
            error: held.error,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
