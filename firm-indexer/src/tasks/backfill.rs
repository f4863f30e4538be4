//! Full reindex backfill.

use firm_indexer_repository::EntityStore;
use tracing::info;

use crate::errors::TaskError;
use crate::queue::{Task, TaskQueue};

/// Enqueue `index_firm` for every stored firm.
///
/// Used to rebuild a fresh index version. Returns the number of tasks
/// enqueued.
pub async fn enqueue_full_reindex(
    store: &dyn EntityStore,
    queue: &dyn TaskQueue,
) -> Result<usize, TaskError> {
    let firm_ids = store.firm_ids().await?;
    for firm_id in &firm_ids {
        queue.enqueue(Task::index_firm(*firm_id))?;
    }

    info!(count = firm_ids.len(), "Enqueued full reindex");
    Ok(firm_ids.len())
}
