//! Index repository trait definition.

use async_trait::async_trait;
use firm_indexer_shared::{FirmDocument, FirmId};

use crate::errors::IndexError;

/// Abstracts the search index holding one document per publishable firm.
///
/// Documents are keyed by firm id. There is no partial update: `store`
/// replaces whatever was held for the id, so concurrent writers for the same
/// firm converge on the last full document written.
///
/// # Index Initialization
///
/// Implementations should have `ensure_index_exists` called during
/// application startup, before any document operation.
#[async_trait]
pub trait IndexRepository: Send + Sync {
    /// Ensure the search index and any required aliases exist, creating them if necessary.
    async fn ensure_index_exists(&self) -> Result<(), IndexError>;

    /// Store the document for a firm, fully replacing any previous one.
    async fn store(&self, id: FirmId, document: &FirmDocument) -> Result<(), IndexError>;

    /// Delete the document for a firm.
    ///
    /// If no document exists, the operation is considered successful.
    async fn delete(&self, id: FirmId) -> Result<(), IndexError>;
}
