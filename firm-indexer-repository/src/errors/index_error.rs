//! Search index error types.

use thiserror::Error;

/// Errors from search index operations.
///
/// Returned by every `IndexRepository` implementation. Callers do not
/// recover locally: the failed task is handed back to the queue's retry
/// policy.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to store a document.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create the search index or its alias.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to serialize a document for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl IndexError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
