//! Firm document types for the search index.
//!
//! This module defines the denormalized document stored for each publishable
//! firm. Field names are the ones the directory's search front end queries.

use serde::{Deserialize, Serialize};

use crate::types::ids::{AdviserId, FirmId, OfficeId};

/// Document representation of a firm in the search index.
///
/// Every list is always serialized, possibly empty. Optional scalars
/// serialize as `null` rather than being omitted, so a stored document
/// always carries the full field set.
///
/// The document holds no timestamps: building it twice from the same stored
/// state produces identical JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirmDocument {
    pub id: FirmId,
    pub registered_name: String,
    pub postcode_searchable: bool,
    pub address_line_one: Option<String>,
    pub address_line_two: Option<String>,
    pub address_town: Option<String>,
    pub address_county: Option<String>,
    pub address_postcode: Option<String>,
    pub telephone_number: Option<String>,
    pub website_address: Option<String>,
    pub email_address: Option<String>,
    pub free_initial_meeting: Option<bool>,
    pub minimum_fixed_fee: Option<i64>,
    pub retirement_income_products: u8,
    pub pension_transfer: u8,
    pub options_when_paying_for_care: u8,
    pub equity_release: u8,
    pub inheritance_tax_planning: u8,
    pub wills_and_probate: u8,
    pub ethical_investing: bool,
    pub sharia_investing: bool,
    pub languages: Vec<String>,
    pub in_person_advice_methods: Vec<i64>,
    pub other_advice_methods: Vec<i64>,
    pub investment_sizes: Vec<i64>,
    pub initial_advice_fee_structures: Vec<i64>,
    pub ongoing_advice_fee_structures: Vec<i64>,
    pub allowed_payment_methods: Vec<i64>,
    pub adviser_qualification_ids: Vec<i64>,
    pub adviser_accreditation_ids: Vec<i64>,
    pub offices: Vec<OfficeSummary>,
    pub advisers: Vec<AdviserSummary>,
}

/// An office nested in its firm's document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfficeSummary {
    pub id: OfficeId,
    pub address_line_one: String,
    pub address_line_two: Option<String>,
    pub address_town: String,
    pub address_county: Option<String>,
    pub address_postcode: String,
    pub email_address: Option<String>,
    pub telephone_number: Option<String>,
    pub website: Option<String>,
    pub disabled_access: bool,
}

/// A geocoded adviser nested in its firm's document.
///
/// `range` is the adviser's travel distance in miles; the search front end
/// matches a user postcode against `location` within that range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdviserSummary {
    pub id: AdviserId,
    pub name: String,
    pub range: u32,
    pub location: Location,
}

/// A `geo_point` in object form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Percentage published for an advice-type flag.
pub fn advice_percentage(flag: bool) -> u8 {
    if flag {
        100
    } else {
        0
    }
}
