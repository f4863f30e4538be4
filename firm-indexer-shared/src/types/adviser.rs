//! Adviser record. Advisers are geocoded from their own postcode and appear in
//! their firm's document as nested search points.

use serde::{Deserialize, Serialize};

use crate::types::coordinates::{Coordinates, Geocodable};
use crate::types::ids::{AdviserId, FirmId};
use crate::types::office::COUNTRY;
use crate::types::validation::{ValidationErrors, ADVISER_POSTCODE, REFERENCE_NUMBER};

/// Radii, in miles, an adviser may choose to travel.
pub const TRAVEL_DISTANCES: [u32; 9] = [10, 25, 50, 100, 150, 200, 250, 300, 650];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adviser {
    pub id: AdviserId,
    pub firm_id: FirmId,
    pub reference_number: String,
    pub name: String,
    pub postcode: String,
    pub travel_distance: u32,
    pub coordinates: Option<Coordinates>,
    pub qualification_ids: Vec<i64>,
    pub accreditation_ids: Vec<i64>,
}

impl Adviser {
    pub fn new(
        id: AdviserId,
        firm_id: FirmId,
        reference_number: impl Into<String>,
        name: impl Into<String>,
        postcode: impl Into<String>,
        travel_distance: u32,
    ) -> Self {
        let mut adviser = Self {
            id,
            firm_id,
            reference_number: reference_number.into(),
            name: name.into(),
            postcode: postcode.into(),
            travel_distance,
            coordinates: None,
            qualification_ids: Vec::new(),
            accreditation_ids: Vec::new(),
        };
        adviser.normalize();
        adviser
    }

    pub fn normalize(&mut self) {
        self.postcode = self.postcode.trim().to_uppercase();
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if errors.require("postcode", &self.postcode) {
            errors.format("postcode", &self.postcode, &ADVISER_POSTCODE);
        }
        if errors.require("reference_number", &self.reference_number) {
            errors.format("reference_number", &self.reference_number, &REFERENCE_NUMBER);
        }
        if !TRAVEL_DISTANCES.contains(&self.travel_distance) {
            errors.add("travel_distance", "is not included in the list");
        }

        errors.into_result()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl Geocodable for Adviser {
    fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        self.coordinates = coordinates.map(|c| Coordinates::new(c.latitude, c.longitude));
    }

    fn full_street_address(&self) -> Option<String> {
        Some(format!("{}, {}", self.postcode, COUNTRY))
    }
}
