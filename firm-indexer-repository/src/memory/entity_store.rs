//! In-memory entity store.
//!
//! Holds firms, offices and advisers in ordered maps and supports the writes
//! the onboarding application makes. Each write returns the `EntityChange`
//! describing it, which callers record on a commit scope.
//!
//! Saving an existing firm or adviser keeps its stored coordinates while
//! the address they were derived from is unchanged. A new adviser postcode,
//! or a main office whose address moves, clears them until the geocode task
//! writes a fresh pair through `update_coordinates`.

use async_trait::async_trait;
use firm_indexer_shared::{
    Adviser, AdviserId, CoordinateTarget, Coordinates, EntityChange, Firm, FirmGraph, FirmId,
    Office, OfficeId, ReferenceData,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::errors::EntityStoreError;
use crate::interfaces::EntityStore;

#[derive(Default)]
struct Tables {
    firms: BTreeMap<FirmId, Firm>,
    offices: BTreeMap<OfficeId, Office>,
    advisers: BTreeMap<AdviserId, Adviser>,
    reference: BTreeMap<FirmId, ReferenceData>,
}

impl Tables {
    fn main_office_id(&self, firm_id: FirmId) -> Option<OfficeId> {
        self.offices
            .values()
            .filter(|office| office.firm_id == firm_id)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|office| office.id)
    }

    fn clear_firm_coordinates(&mut self, firm_id: FirmId) {
        if let Some(firm) = self.firms.get_mut(&firm_id) {
            firm.coordinates = None;
        }
    }
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
    coordinate_writes: AtomicUsize,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a firm.
    pub async fn save_firm(&self, mut firm: Firm) -> EntityChange {
        firm.normalize_languages();
        let mut tables = self.tables.write().await;
        if let Some(before) = tables.firms.get(&firm.id) {
            firm.coordinates = before.coordinates;
        }
        let change = EntityChange::firm_saved(&firm);
        tables.firms.insert(firm.id, firm);
        change
    }

    /// Remove a firm together with its offices, advisers and reference data.
    pub async fn destroy_firm(&self, id: FirmId) -> Option<EntityChange> {
        let mut tables = self.tables.write().await;
        tables.firms.remove(&id)?;
        tables.offices.retain(|_, office| office.firm_id != id);
        tables.advisers.retain(|_, adviser| adviser.firm_id != id);
        tables.reference.remove(&id);
        Some(EntityChange::firm_destroyed(id))
    }

    pub async fn set_reference_data(&self, firm_id: FirmId, reference: ReferenceData) {
        self.tables.write().await.reference.insert(firm_id, reference);
    }

    /// Insert or replace an office, recording whether it is, or was, its
    /// firm's main office.
    pub async fn save_office(&self, mut office: Office) -> EntityChange {
        office.normalize();
        let mut tables = self.tables.write().await;
        let main_before = tables.main_office_id(office.firm_id);
        let before = tables.offices.insert(office.id, office.clone());
        let main_after = tables.main_office_id(office.firm_id);
        let change = EntityChange::office_saved(before.as_ref(), &office, main_before, main_after);
        if let EntityChange::OfficeSaved {
            address_changed: true,
            is_main_office,
            was_main_office,
            ..
        } = change
        {
            if is_main_office || was_main_office {
                tables.clear_firm_coordinates(office.firm_id);
            }
        }
        change
    }

    pub async fn destroy_office(&self, id: OfficeId) -> Option<EntityChange> {
        let mut tables = self.tables.write().await;
        let firm_id = tables.offices.get(&id)?.firm_id;
        let was_main_office = tables.main_office_id(firm_id) == Some(id);
        let office = tables.offices.remove(&id)?;
        if was_main_office {
            tables.clear_firm_coordinates(firm_id);
        }
        Some(EntityChange::office_destroyed(&office, was_main_office))
    }

    /// Insert or replace an adviser. Moving an adviser to another firm is a
    /// save with a different `firm_id`.
    pub async fn save_adviser(&self, mut adviser: Adviser) -> EntityChange {
        adviser.normalize();
        let mut tables = self.tables.write().await;
        let before = tables.advisers.get(&adviser.id).cloned();
        adviser.coordinates = before
            .as_ref()
            .filter(|b| b.postcode == adviser.postcode)
            .and_then(|b| b.coordinates);
        let change = EntityChange::adviser_saved(before.as_ref(), &adviser);
        tables.advisers.insert(adviser.id, adviser);
        change
    }

    pub async fn destroy_adviser(&self, id: AdviserId) -> Option<EntityChange> {
        let adviser = self.tables.write().await.advisers.remove(&id)?;
        Some(EntityChange::adviser_destroyed(&adviser))
    }

    /// Current state of a firm row, without its associations.
    pub async fn firm(&self, id: FirmId) -> Option<Firm> {
        self.tables.read().await.firms.get(&id).cloned()
    }

    /// Number of coordinate writes performed through `update_coordinates`.
    pub fn coordinate_writes(&self) -> usize {
        self.coordinate_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn load_firm(&self, id: FirmId) -> Result<Option<FirmGraph>, EntityStoreError> {
        let tables = self.tables.read().await;
        let Some(firm) = tables.firms.get(&id) else {
            return Ok(None);
        };

        let offices = tables
            .offices
            .values()
            .filter(|office| office.firm_id == id)
            .cloned()
            .collect();
        let advisers = tables
            .advisers
            .values()
            .filter(|adviser| adviser.firm_id == id)
            .cloned()
            .collect();
        let reference = tables.reference.get(&id).cloned().unwrap_or_default();

        Ok(Some(FirmGraph::new(firm.clone(), offices, advisers, reference)))
    }

    async fn load_adviser(&self, id: AdviserId) -> Result<Option<Adviser>, EntityStoreError> {
        Ok(self.tables.read().await.advisers.get(&id).cloned())
    }

    async fn firm_ids(&self) -> Result<Vec<FirmId>, EntityStoreError> {
        Ok(self.tables.read().await.firms.keys().copied().collect())
    }

    async fn update_coordinates(
        &self,
        target: CoordinateTarget,
        coordinates: Option<Coordinates>,
    ) -> Result<(), EntityStoreError> {
        let mut tables = self.tables.write().await;
        let slot = match target {
            CoordinateTarget::Firm(id) => tables.firms.get_mut(&id).map(|f| &mut f.coordinates),
            CoordinateTarget::Adviser(id) => {
                tables.advisers.get_mut(&id).map(|a| &mut a.coordinates)
            }
        };
        let slot = slot.ok_or_else(|| EntityStoreError::not_found(target.to_string()))?;
        *slot = coordinates.map(|c| Coordinates::new(c.latitude, c.longitude));
        self.coordinate_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
