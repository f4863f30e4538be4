//! Error types for the firm indexer.

use firm_indexer_repository::{EntityStoreError, IndexError};
use thiserror::Error;

/// Errors that can occur while consuming and dispatching tasks.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// A failed task could not be handed back to the queue.
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),
}

impl IngestError {
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for IngestError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

/// Errors raised when handing a task to the queue.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Kafka error: {0}")]
    KafkaError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The receiving side of the queue is gone.
    #[error("Queue closed: {0}")]
    Closed(String),
}

impl QueueError {
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self::Closed(msg.into())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Errors from running a single geocode or index task.
///
/// Any error hands the task back to the queue's retry policy.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Store error: {0}")]
    StoreError(#[from] EntityStoreError),

    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    /// The geocoding provider could not answer.
    #[error("Geocoding error: {0}")]
    GeocodingError(String),
}

impl TaskError {
    pub fn geocoding(msg: impl Into<String>) -> Self {
        Self::GeocodingError(msg.into())
    }
}
