//! A firm loaded together with everything its search document is built from.

use serde::{Deserialize, Serialize};

use crate::types::adviser::Adviser;
use crate::types::coordinates::{Coordinates, Geocodable};
use crate::types::firm::Firm;
use crate::types::ids::FirmId;
use crate::types::office::Office;

/// Ids of the reference data a firm is linked to through join tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub in_person_advice_methods: Vec<i64>,
    pub other_advice_methods: Vec<i64>,
    pub investment_sizes: Vec<i64>,
    pub initial_advice_fee_structures: Vec<i64>,
    pub ongoing_advice_fee_structures: Vec<i64>,
    pub allowed_payment_methods: Vec<i64>,
}

/// The firm aggregate: the firm row, its offices, its advisers and its
/// reference data.
///
/// The graph is [`Geocodable`]: its address is the main office's address and
/// its coordinates are the firm row's coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmGraph {
    pub firm: Firm,
    offices: Vec<Office>,
    pub advisers: Vec<Adviser>,
    pub reference: ReferenceData,
}

impl FirmGraph {
    pub fn new(
        firm: Firm,
        mut offices: Vec<Office>,
        mut advisers: Vec<Adviser>,
        reference: ReferenceData,
    ) -> Self {
        offices.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        advisers.sort_by_key(|adviser| adviser.id);
        Self {
            firm,
            offices,
            advisers,
            reference,
        }
    }

    pub fn id(&self) -> FirmId {
        self.firm.id
    }

    /// Offices ordered by creation time.
    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    /// The earliest created office, if the firm has any.
    pub fn main_office(&self) -> Option<&Office> {
        self.offices.first()
    }

    /// True when the firm offers face-to-face advice. Drives `postcode_searchable`.
    pub fn in_person_advice(&self) -> bool {
        !self.reference.in_person_advice_methods.is_empty()
    }

    /// Advisers that currently hold a coordinate pair.
    pub fn geocoded_advisers(&self) -> impl Iterator<Item = &Adviser> {
        self.advisers.iter().filter(|adviser| adviser.is_geocoded())
    }
}

impl Geocodable for FirmGraph {
    fn coordinates(&self) -> Option<Coordinates> {
        self.firm.coordinates
    }

    fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        self.firm.coordinates = coordinates.map(|c| Coordinates::new(c.latitude, c.longitude));
    }

    fn full_street_address(&self) -> Option<String> {
        self.main_office().map(Office::full_street_address)
    }
}
