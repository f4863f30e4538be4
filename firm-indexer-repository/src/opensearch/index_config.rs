//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the firm index.

use serde_json::{json, Value};

/// Configuration for the firm index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The alias name for the index (used for all document operations).
    pub alias: String,
    /// The version number for the index (e.g., 0 for "firms_v0").
    pub version: u32,
}

impl IndexConfig {
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// The concrete index the alias points at.
    pub fn versioned_index_name(&self) -> String {
        get_versioned_index_name(Some(self.version))
    }
}

/// The base name of the firm index (without version).
pub const INDEX_NAME: &str = "firms";

/// Get the versioned index name, e.g. "firms_v0".
pub fn get_versioned_index_name(version: Option<u32>) -> String {
    let v = version.unwrap_or(0);
    format!("{}_v{}", INDEX_NAME, v)
}

/// Get the index settings and mappings for the firm index.
///
/// - Ids and reference-data ids are keywords, for exact filtering
/// - `registered_name` is full text with a raw keyword for sorting
/// - `advisers` is nested so each adviser's `location` and `range` are
///   matched together in a geo-distance query
pub fn get_index_settings(_version: Option<u32>) -> Value {
    let keyword = json!({ "type": "keyword" });
    let integer = json!({ "type": "integer" });
    let boolean = json!({ "type": "boolean" });
    let text = json!({ "type": "text" });
    let stored_only = json!({ "type": "keyword", "index": false });

    let office = json!({
        "type": "nested",
        "properties": {
            "id": keyword,
            "address_line_one": text,
            "address_line_two": text,
            "address_town": keyword,
            "address_county": keyword,
            "address_postcode": keyword,
            "email_address": stored_only,
            "telephone_number": stored_only,
            "website": stored_only,
            "disabled_access": boolean
        }
    });

    let adviser = json!({
        "type": "nested",
        "properties": {
            "id": keyword,
            "name": text,
            "range": integer,
            "location": { "type": "geo_point" }
        }
    });

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": keyword,
                "registered_name": {
                    "type": "text",
                    "fields": {
                        "raw": { "type": "keyword" }
                    }
                },
                "postcode_searchable": boolean,
                "address_line_one": text,
                "address_line_two": text,
                "address_town": keyword,
                "address_county": keyword,
                "address_postcode": keyword,
                "telephone_number": stored_only,
                "website_address": stored_only,
                "email_address": stored_only,
                "free_initial_meeting": boolean,
                "minimum_fixed_fee": integer,
                "retirement_income_products": integer,
                "pension_transfer": integer,
                "options_when_paying_for_care": integer,
                "equity_release": integer,
                "inheritance_tax_planning": integer,
                "wills_and_probate": integer,
                "ethical_investing": boolean,
                "sharia_investing": boolean,
                "languages": keyword,
                "in_person_advice_methods": keyword,
                "other_advice_methods": keyword,
                "investment_sizes": keyword,
                "initial_advice_fee_structures": keyword,
                "ongoing_advice_fee_structures": keyword,
                "allowed_payment_methods": keyword,
                "adviser_qualification_ids": keyword,
                "adviser_accreditation_ids": keyword,
                "offices": office,
                "advisers": adviser
            }
        }
    })
}
