//! In-process task queue over a tokio channel.
//!
//! Used for local development and tests. Tasks do not survive a restart.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, instrument};

use crate::errors::{IngestError, QueueError};
use crate::queue::messages::StreamMessage;
use crate::queue::task::TaskEnvelope;
use crate::queue::{TaskQueue, TaskSource};

const DEFAULT_BATCH_SIZE: usize = 50;

/// Write half of the in-process queue. Cheap to clone.
#[derive(Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::UnboundedSender<TaskEnvelope>,
}

/// Read half of the in-process queue.
pub struct ChannelTaskSource {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TaskEnvelope>>>,
    batch_size: usize,
}

fn channel() -> (ChannelTaskQueue, ChannelTaskSource) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ChannelTaskQueue { sender },
        ChannelTaskSource {
            receiver: Mutex::new(Some(receiver)),
            batch_size: DEFAULT_BATCH_SIZE,
        },
    )
}

impl ChannelTaskQueue {
    /// Create a connected queue and source.
    pub fn new() -> (Self, ChannelTaskSource) {
        channel()
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn enqueue_envelope(&self, envelope: TaskEnvelope) -> Result<(), QueueError> {
        debug!(task = %envelope.task, attempt = envelope.attempt, "Enqueued task");
        self.sender
            .send(envelope)
            .map_err(|e| QueueError::closed(e.to_string()))
    }
}

impl ChannelTaskSource {
    /// Take every task waiting on the channel without running it.
    ///
    /// Returns nothing while `run` owns the receiver.
    pub fn drain_pending(&self) -> Vec<TaskEnvelope> {
        let mut pending = Vec::new();
        if let Ok(mut guard) = self.receiver.try_lock() {
            if let Some(receiver) = guard.as_mut() {
                while let Ok(envelope) = receiver.try_recv() {
                    pending.push(envelope);
                }
            }
        }
        pending
    }
}

#[async_trait]
impl TaskSource for ChannelTaskSource {
    fn subscribe(&self) -> Result<(), IngestError> {
        info!("Using in-process task queue");
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let mut guard = self.receiver.lock().await;
        let receiver = guard
            .as_mut()
            .ok_or_else(|| IngestError::channel("Task receiver already closed"))?;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Task source received shutdown signal");
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { success: false, error, .. }) => {
                            error!(
                                error = error.as_deref().unwrap_or("Unknown error"),
                                "Batch failed; in-process tasks cannot be redelivered"
                            );
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                envelope = receiver.recv() => {
                    match envelope {
                        Some(first) => {
                            let mut tasks = vec![first];
                            while tasks.len() < self.batch_size {
                                match receiver.try_recv() {
                                    Ok(envelope) => tasks.push(envelope),
                                    Err(_) => break,
                                }
                            }
                            debug!(count = tasks.len(), "Sending batch of tasks");
                            sender
                                .send(StreamMessage::Tasks { tasks, offsets: Vec::new() })
                                .await
                                .map_err(|e| IngestError::channel(e.to_string()))?;
                        }
                        None => {
                            info!("Task channel closed");
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
