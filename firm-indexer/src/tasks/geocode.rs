//! Geocode task for firms and advisers.
//!
//! Resolves an entity's address, writes the two coordinate columns and
//! schedules the firm's reindex. The same steps run for both entity types
//! through [`Geocodable`]; only loading and the index target differ.

use std::sync::Arc;

use firm_indexer_repository::EntityStore;
use firm_indexer_shared::{AdviserId, CoordinateTarget, Coordinates, FirmId, Geocodable};
use geocoder::{GeocodeResult, Geocoder};
use tracing::{debug, info, instrument, warn};

use crate::config::IndexPolicy;
use crate::errors::TaskError;
use crate::queue::{Task, TaskQueue};
use crate::tasks::PipelineStats;

/// What a geocode task did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    /// The entity no longer exists.
    Missing,
    /// The entity fails validation and is left alone.
    Invalid,
    /// Coordinates are present and the address did not change.
    AlreadyGeocoded,
    Found(Coordinates),
    /// The provider has no match; coordinates were cleared.
    NotFound,
    /// There is no address to look up; coordinates were cleared.
    NoAddress,
}

pub struct Geocoding {
    store: Arc<dyn EntityStore>,
    geocoder: Arc<dyn Geocoder>,
    queue: Arc<dyn TaskQueue>,
    policy: IndexPolicy,
    stats: Arc<PipelineStats>,
}

impl Geocoding {
    pub fn new(
        store: Arc<dyn EntityStore>,
        geocoder: Arc<dyn Geocoder>,
        queue: Arc<dyn TaskQueue>,
        policy: IndexPolicy,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            geocoder,
            queue,
            policy,
            stats,
        }
    }

    /// Geocode a firm from its main office address.
    #[instrument(skip(self), fields(firm_id = %firm_id))]
    pub async fn geocode_firm(
        &self,
        firm_id: FirmId,
        address_changed: bool,
    ) -> Result<GeocodeOutcome, TaskError> {
        let Some(mut graph) = self.store.load_firm(firm_id).await? else {
            debug!("Firm no longer exists, nothing to geocode");
            return Ok(GeocodeOutcome::Missing);
        };
        let valid = graph.firm.is_valid();

        self.geocode_entity(
            &mut graph,
            CoordinateTarget::Firm(firm_id),
            firm_id,
            valid,
            address_changed,
        )
        .await
    }

    /// Geocode an adviser from its postcode.
    #[instrument(skip(self), fields(adviser_id = %adviser_id))]
    pub async fn geocode_adviser(
        &self,
        adviser_id: AdviserId,
        address_changed: bool,
    ) -> Result<GeocodeOutcome, TaskError> {
        let Some(mut adviser) = self.store.load_adviser(adviser_id).await? else {
            debug!("Adviser no longer exists, nothing to geocode");
            return Ok(GeocodeOutcome::Missing);
        };
        let valid = adviser.is_valid();
        let firm_id = adviser.firm_id;

        self.geocode_entity(
            &mut adviser,
            CoordinateTarget::Adviser(adviser_id),
            firm_id,
            valid,
            address_changed,
        )
        .await
    }

    async fn geocode_entity<E: Geocodable>(
        &self,
        entity: &mut E,
        target: CoordinateTarget,
        firm_id: FirmId,
        valid: bool,
        address_changed: bool,
    ) -> Result<GeocodeOutcome, TaskError> {
        if !valid {
            warn!(target = %target, "Skipping geocode of invalid record");
            return Ok(GeocodeOutcome::Invalid);
        }

        if !entity.needs_geocoding(address_changed) {
            debug!(target = %target, "Already geocoded and address unchanged");
            // The commit itself did not schedule a reindex under this policy
            if !self.policy.indexes_on_commit() {
                self.queue.enqueue(Task::index_firm(firm_id))?;
            }
            return Ok(GeocodeOutcome::AlreadyGeocoded);
        }

        let Some(address) = entity.full_street_address() else {
            debug!(target = %target, "No address to geocode");
            self.record_failure(entity, target, firm_id).await?;
            return Ok(GeocodeOutcome::NoAddress);
        };

        match self.geocoder.lookup(&address).await {
            GeocodeResult::Found(coordinates) => {
                entity.set_coordinates(Some(coordinates));
                self.store
                    .update_coordinates(target, entity.coordinates())
                    .await?;
                self.stats.record_geocode_success();
                self.queue.enqueue(Task::index_firm(firm_id))?;

                info!(target = %target, coordinates = %coordinates, "Geocoded");
                Ok(GeocodeOutcome::Found(coordinates))
            }
            GeocodeResult::NotFound => {
                info!(target = %target, address = %address, "Address not found");
                self.record_failure(entity, target, firm_id).await?;
                Ok(GeocodeOutcome::NotFound)
            }
            GeocodeResult::TransientError(reason) => {
                // Never leave a pair that may belong to the previous address
                self.record_failure(entity, target, firm_id).await?;
                Err(TaskError::geocoding(reason))
            }
        }
    }

    /// Clear the coordinates after a lookup that produced none.
    ///
    /// Clearing a pair the document may still carry always schedules a
    /// reindex, whatever the policy.
    async fn record_failure<E: Geocodable>(
        &self,
        entity: &mut E,
        target: CoordinateTarget,
        firm_id: FirmId,
    ) -> Result<(), TaskError> {
        let had_coordinates = entity.is_geocoded();
        entity.set_coordinates(None);
        self.store.update_coordinates(target, None).await?;
        self.stats.record_geocode_failure();

        if had_coordinates || self.policy.indexes_after_failed_geocode() {
            self.queue.enqueue(Task::index_firm(firm_id))?;
        }
        Ok(())
    }
}
