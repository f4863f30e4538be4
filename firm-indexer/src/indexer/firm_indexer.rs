//! Keeps a firm's search document in line with its stored state.
//!
//! Loads documents into the index repository, deleting them when the firm
//! is gone or no longer publishable.

use std::sync::Arc;

use firm_indexer_repository::{EntityStore, IndexRepository};
use firm_indexer_shared::FirmId;
use tracing::{debug, info, instrument};

use crate::errors::TaskError;
use crate::indexer::document_builder::build_document;
use crate::indexer::publication::is_publishable;
use crate::tasks::PipelineStats;

/// What an index run did to the firm's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Stored,
    Deleted,
}

pub struct FirmIndexer {
    store: Arc<dyn EntityStore>,
    repository: Arc<dyn IndexRepository>,
    stats: Arc<PipelineStats>,
}

impl FirmIndexer {
    pub fn new(
        store: Arc<dyn EntityStore>,
        repository: Arc<dyn IndexRepository>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            repository,
            stats,
        }
    }

    /// Store or delete the firm's document from current state.
    ///
    /// A missing firm and a firm without a main office both delete; deleting
    /// an absent document succeeds, so office and adviser changes that
    /// outlive their firm are harmless. Errors are returned for the queue to
    /// retry.
    #[instrument(skip(self), fields(firm_id = %firm_id))]
    pub async fn index_firm(&self, firm_id: FirmId) -> Result<IndexOutcome, TaskError> {
        let graph = match self.store.load_firm(firm_id).await? {
            Some(graph) if is_publishable(&graph) => graph,
            Some(_) => {
                debug!("Firm has no main office, removing document");
                return self.delete(firm_id).await;
            }
            None => {
                debug!("Firm no longer exists, removing document");
                return self.delete(firm_id).await;
            }
        };

        let document = build_document(&graph);
        self.repository.store(firm_id, &document).await?;
        self.stats.record_document_stored();

        info!(
            advisers = document.advisers.len(),
            offices = document.offices.len(),
            "Stored firm document"
        );
        Ok(IndexOutcome::Stored)
    }

    async fn delete(&self, firm_id: FirmId) -> Result<IndexOutcome, TaskError> {
        self.repository.delete(firm_id).await?;
        self.stats.record_document_deleted();
        info!(firm_id = %firm_id, "Deleted firm document");
        Ok(IndexOutcome::Deleted)
    }
}
