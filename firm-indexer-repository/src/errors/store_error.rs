//! Relational store error types.

use thiserror::Error;

/// Errors from reading or writing the relational system of record.
#[derive(Debug, Error)]
pub enum EntityStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row a write targeted does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl EntityStoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
