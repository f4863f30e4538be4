//! Kafka-backed task queue.
//!
//! Tasks are written as JSON to a single topic, keyed by `<kind>:<id>` so
//! every task for the same target lands on the same partition. The source
//! commits offsets only once the orchestrator acknowledges a batch, and
//! seeks back to the first task of a rejected batch so it is read again.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message as KafkaMessage,
    producer::{BaseRecord, DefaultProducerContext, Producer, ThreadedProducer},
    Offset as KafkaOffset, TopicPartitionList,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{IngestError, QueueError};
use crate::queue::messages::{Offset, StreamMessage};
use crate::queue::offsets::OffsetTracker;
use crate::queue::task::TaskEnvelope;
use crate::queue::{TaskQueue, TaskSource};

/// The Kafka topic carrying pipeline tasks.
pub const TASKS_TOPIC: &str = "firm-indexer.tasks";

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// How long a seek back to a rejected offset may take.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings shared by the producer and the consumer.
#[derive(Debug, Clone)]
pub struct KafkaQueueConfig {
    /// Kafka broker addresses (comma-separated)
    pub broker: String,
    pub group_id: String,
    pub topic: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    /// SASL password (required if username is set)
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl KafkaQueueConfig {
    pub fn new(broker: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            group_id: group_id.into(),
            topic: TASKS_TOPIC.to_string(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Read the configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER` - Broker address (default: `localhost:9092`)
    /// - `KAFKA_GROUP_ID` - Consumer group (default: `firm-indexer`)
    /// - `KAFKA_TASK_TOPIC` - Task topic (default: `firm-indexer.tasks`)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD` - SASL credentials (optional)
    /// - `KAFKA_SSL_CA_PEM` - Custom CA cert in PEM format (optional)
    pub fn from_env() -> Self {
        Self {
            broker: env::var("KAFKA_BROKER").unwrap_or_else(|_| "localhost:9092".to_string()),
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "firm-indexer".to_string()),
            topic: env::var("KAFKA_TASK_TOPIC").unwrap_or_else(|_| TASKS_TOPIC.to_string()),
            username: env::var("KAFKA_USERNAME").ok(),
            password: env::var("KAFKA_PASSWORD").ok(),
            ssl_ca_pem: env::var("KAFKA_SSL_CA_PEM").ok(),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", &self.broker);

        // SASL/SSL for managed Kafka, plaintext for local development
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }

        client_config
    }
}

fn message_key(envelope: &TaskEnvelope) -> String {
    envelope.task.to_string()
}

/// Producer side of the Kafka queue.
pub struct KafkaTaskQueue {
    producer: ThreadedProducer<DefaultProducerContext>,
    topic: String,
}

impl KafkaTaskQueue {
    pub fn new(config: &KafkaQueueConfig) -> Result<Self, QueueError> {
        let producer: ThreadedProducer<DefaultProducerContext> = config
            .client_config()
            .set("client.id", "firm-indexer-producer")
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .create()
            .map_err(|e| QueueError::kafka(e.to_string()))?;

        info!(broker = %config.broker, topic = %config.topic, "Created Kafka task producer");

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

impl TaskQueue for KafkaTaskQueue {
    fn enqueue_envelope(&self, envelope: TaskEnvelope) -> Result<(), QueueError> {
        let key = message_key(&envelope);
        let payload = serde_json::to_vec(&envelope)?;

        self.producer
            .send(BaseRecord::to(&self.topic).key(&key).payload(&payload))
            .map_err(|(e, _)| QueueError::kafka(e.to_string()))?;

        debug!(task = %envelope.task, attempt = envelope.attempt, "Enqueued task");
        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Result<(), QueueError> {
        self.producer
            .flush(timeout)
            .map_err(|e| QueueError::kafka(e.to_string()))
    }
}

/// Consumer side of the Kafka queue.
pub struct KafkaTaskSource {
    consumer: StreamConsumer,
    topics: Vec<String>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaTaskSource {
    pub fn new(config: &KafkaQueueConfig) -> Result<Self, IngestError> {
        Self::with_batch_config(config, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT_MS)
    }

    /// Create a source with custom batch configuration.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Number of tasks to batch before sending
    /// * `batch_timeout_ms` - Maximum time to wait before flushing a partial batch (milliseconds)
    pub fn with_batch_config(
        config: &KafkaQueueConfig,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, IngestError> {
        let consumer: StreamConsumer = config
            .client_config()
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            broker = %config.broker,
            group_id = %config.group_id,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            "Created Kafka task consumer with batching"
        );

        Ok(Self {
            consumer,
            topics: vec![config.topic.clone()],
            batch_size,
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    async fn flush_batch(
        &self,
        batch: &mut Vec<TaskEnvelope>,
        offsets: &mut Vec<Offset>,
        tracker: &mut OffsetTracker,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }

        tracker.delivered(offsets.as_slice());
        debug!(task_count = batch.len(), "Sending batch of tasks to orchestrator");
        sender
            .send(StreamMessage::Tasks {
                tasks: std::mem::take(batch),
                offsets: std::mem::take(offsets),
            })
            .await
            .map_err(|e| IngestError::channel(e.to_string()))
    }

    /// Commit `(topic, partition, next offset to read)` positions.
    fn commit_positions(&self, positions: &[Offset]) -> Result<(), IngestError> {
        if positions.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (topic, partition, next) in positions {
            tpl.add_partition_offset(topic, *partition, KafkaOffset::Offset(*next))?;
        }

        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    /// Resume reading each partition at the given offset.
    fn seek_to(&self, positions: &[Offset]) -> Result<(), IngestError> {
        for (topic, partition, offset) in positions {
            self.consumer
                .seek(topic, *partition, KafkaOffset::Offset(*offset), SEEK_TIMEOUT)?;
            info!(topic = %topic, partition = partition, offset = offset, "Rewound to rejected task");
        }
        Ok(())
    }

    fn parse_message(payload: Option<&[u8]>) -> Result<Option<TaskEnvelope>, IngestError> {
        match payload {
            Some(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| IngestError::parse(format!("Failed to decode task: {}", e))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskSource for KafkaTaskSource {
    fn subscribe(&self) -> Result<(), IngestError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut batch: Vec<TaskEnvelope> = Vec::with_capacity(self.batch_size);
        let mut pending_offsets: Vec<Offset> = Vec::new();
        let mut tracker = OffsetTracker::new();
        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        flush_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Task source received shutdown signal");
                    // Uncommitted tasks are re-read from the last committed offset on restart
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            if success {
                                let positions = tracker.acknowledged(&offsets);
                                if let Err(e) = self.commit_positions(&positions) {
                                    error!(error = %e, "Failed to commit offsets after acknowledgment");
                                } else {
                                    debug!(
                                        offset_count = offsets.len(),
                                        committed = positions.len(),
                                        "Committed offsets after successful processing"
                                    );
                                }
                            } else {
                                warn!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Batch rejected, rewinding to redeliver it"
                                );
                                let positions = tracker.rejected(&offsets);
                                if let Err(e) = self.seek_to(&positions) {
                                    // Offsets stay uncommitted, so a restart still re-reads them
                                    error!(error = %e, "Failed to rewind after rejected batch");
                                }
                            }
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            let offset = (msg.topic().to_string(), msg.partition(), msg.offset());
                            match Self::parse_message(msg.payload()) {
                                Ok(Some(envelope)) => {
                                    debug!(
                                        topic = %msg.topic(),
                                        partition = msg.partition(),
                                        offset = msg.offset(),
                                        task = %envelope.task,
                                        "Received task"
                                    );
                                    batch.push(envelope);
                                    pending_offsets.push(offset);

                                    if batch.len() >= self.batch_size {
                                        self.flush_batch(&mut batch, &mut pending_offsets, &mut tracker, &sender).await?;
                                    }
                                }
                                result => {
                                    if let Err(e) = result {
                                        error!(
                                            topic = %msg.topic(),
                                            partition = msg.partition(),
                                            offset = msg.offset(),
                                            error = %e,
                                            "Skipping undecodable task"
                                        );
                                    }
                                    // Nothing to run. While a batch is filling the offset
                                    // rides along with it.
                                    if batch.is_empty() {
                                        let skipped = [offset];
                                        tracker.delivered(&skipped);
                                        self.commit_positions(&tracker.acknowledged(&skipped))?;
                                    } else {
                                        pending_offsets.push(offset);
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            self.flush_batch(&mut batch, &mut pending_offsets, &mut tracker, &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "Flushing batch due to timeout");
                        self.flush_batch(&mut batch, &mut pending_offsets, &mut tracker, &sender).await?;
                    }
                }
            }
        }

        Ok(())
    }
}
