//! Dispatches a dequeued task to its handler.

use std::sync::Arc;

use firm_indexer_repository::{EntityStore, IndexRepository};
use geocoder::Geocoder;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::errors::TaskError;
use crate::indexer::{FirmIndexer, IndexOutcome};
use crate::queue::{Task, TaskQueue};
use crate::tasks::geocode::{GeocodeOutcome, Geocoding};
use crate::tasks::PipelineStats;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome {
    Geocoded(GeocodeOutcome),
    Indexed(IndexOutcome),
}

/// Runs geocode and index tasks against the store, the geocoder and the
/// index.
///
/// Tasks reload current state, so running the same task twice is harmless.
/// Any error is returned for the caller to retry.
pub struct TaskRunner {
    geocoding: Geocoding,
    indexer: FirmIndexer,
    stats: Arc<PipelineStats>,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn EntityStore>,
        geocoder: Arc<dyn Geocoder>,
        repository: Arc<dyn IndexRepository>,
        queue: Arc<dyn TaskQueue>,
        config: &PipelineConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            geocoding: Geocoding::new(
                store.clone(),
                geocoder,
                queue,
                config.index_policy,
                stats.clone(),
            ),
            indexer: FirmIndexer::new(store, repository, stats.clone()),
            stats,
        }
    }

    pub async fn run(&self, task: &Task) -> Result<TaskOutcome, TaskError> {
        debug!(task = %task, "Running task");
        let outcome = match *task {
            Task::GeocodeFirm {
                firm_id,
                address_changed,
            } => TaskOutcome::Geocoded(self.geocoding.geocode_firm(firm_id, address_changed).await?),
            Task::GeocodeAdviser {
                adviser_id,
                address_changed,
            } => TaskOutcome::Geocoded(
                self.geocoding
                    .geocode_adviser(adviser_id, address_changed)
                    .await?,
            ),
            Task::IndexFirm { firm_id } => {
                TaskOutcome::Indexed(self.indexer.index_firm(firm_id).await?)
            }
        };
        debug!(task = %task, outcome = ?outcome, "Task finished");
        Ok(outcome)
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }
}
