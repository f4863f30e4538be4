//! Task queue for the geocode-then-index pipeline.
//!
//! Tasks are written by the change notifier after a commit and read back by
//! the orchestrator. Two backends are provided: an in-process channel for
//! development and tests, and a Kafka topic for production.

mod channel;
mod kafka;
mod messages;
mod offsets;
mod task;

pub use channel::{ChannelTaskQueue, ChannelTaskSource};
pub use kafka::{KafkaQueueConfig, KafkaTaskQueue, KafkaTaskSource, TASKS_TOPIC};
pub use messages::{Offset, StreamMessage};
pub use task::{Task, TaskEnvelope, TaskKind};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::errors::{IngestError, QueueError};

/// Write side of the task queue.
///
/// Enqueueing never blocks on the work itself: it returns once the task is
/// handed to the backend.
pub trait TaskQueue: Send + Sync {
    fn enqueue_envelope(&self, envelope: TaskEnvelope) -> Result<(), QueueError>;

    /// Enqueue a task for its first attempt.
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        self.enqueue_envelope(TaskEnvelope::new(task))
    }

    /// Wait up to `timeout` for buffered tasks to reach the backend.
    fn flush(&self, _timeout: Duration) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Read side of the task queue.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Prepare the source for delivery.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Deliver tasks through `sender` until the stream ends or `shutdown`
    /// fires.
    ///
    /// The orchestrator answers every `Tasks` batch with an `Acknowledgment`
    /// on `ack_receiver`, not necessarily in delivery order. A source with
    /// durable offsets never commits past a task that was not acknowledged
    /// as successful, and re-delivers rejected ones.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}
