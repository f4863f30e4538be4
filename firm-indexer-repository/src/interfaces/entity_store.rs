//! Entity store trait definition.

use async_trait::async_trait;
use firm_indexer_shared::{Adviser, AdviserId, CoordinateTarget, Coordinates, FirmGraph, FirmId};

use crate::errors::EntityStoreError;

/// Read access to the relational system of record, plus the one write the
/// pipeline performs.
///
/// Every read returns current committed state. Tasks reload through this
/// trait when they run rather than trusting data captured when they were
/// scheduled.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load a firm with its offices, advisers and reference data.
    ///
    /// Returns `Ok(None)` when the firm does not exist.
    async fn load_firm(&self, id: FirmId) -> Result<Option<FirmGraph>, EntityStoreError>;

    async fn load_adviser(&self, id: AdviserId) -> Result<Option<Adviser>, EntityStoreError>;

    /// Ids of every firm, in ascending order.
    async fn firm_ids(&self) -> Result<Vec<FirmId>, EntityStoreError>;

    /// Write the two coordinate columns of one row and nothing else.
    ///
    /// Skips validation and produces no change record, so a geocode result
    /// never schedules further work. `None` clears both columns.
    async fn update_coordinates(
        &self,
        target: CoordinateTarget,
        coordinates: Option<Coordinates>,
    ) -> Result<(), EntityStoreError>;
}
