//! Firm record as held by the relational store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::coordinates::Coordinates;
use crate::types::ids::FirmId;
use crate::types::validation::{ValidationErrors, EMAIL, TELEPHONE, WEBSITE};

/// The kinds of advice a firm offers. At least one must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceTypes {
    pub retirement_income_products: bool,
    pub pension_transfer: bool,
    pub long_term_care: bool,
    pub equity_release: bool,
    pub inheritance_tax_and_estate_planning: bool,
    pub wills_and_probate: bool,
}

impl AdviceTypes {
    pub fn any(&self) -> bool {
        self.retirement_income_products
            || self.pension_transfer
            || self.long_term_care
            || self.equity_release
            || self.inheritance_tax_and_estate_planning
            || self.wills_and_probate
    }
}

/// A regulated financial advice firm.
///
/// The firm's postal address is not stored here: it is the address of the
/// firm's main office, resolved through [`crate::FirmGraph`]. The coordinate
/// pair is stored on the firm row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firm {
    pub id: FirmId,
    pub registered_name: String,
    pub email_address: Option<String>,
    pub telephone_number: Option<String>,
    pub website_address: Option<String>,
    pub free_initial_meeting: Option<bool>,
    pub minimum_fixed_fee: Option<i64>,
    pub advice_types: AdviceTypes,
    pub ethical_investing: bool,
    pub sharia_investing: bool,
    pub languages: Vec<String>,
    pub coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
}

impl Firm {
    /// A firm with only its name set. Used as a starting point by stores and tests.
    pub fn new(id: FirmId, registered_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            registered_name: registered_name.into(),
            email_address: None,
            telephone_number: None,
            website_address: None,
            free_initial_meeting: None,
            minimum_fixed_fee: None,
            advice_types: AdviceTypes::default(),
            ethical_investing: false,
            sharia_investing: false,
            languages: Vec::new(),
            coordinates: None,
            created_at,
        }
    }

    /// Telephone number with spaces removed, as published.
    pub fn normalized_telephone(&self) -> Option<String> {
        self.telephone_number
            .as_ref()
            .map(|number| number.replace(' ', ""))
    }

    /// Drop blank and repeated language codes, keeping first occurrences.
    pub fn normalize_languages(&mut self) {
        let mut seen = Vec::with_capacity(self.languages.len());
        for language in self.languages.drain(..) {
            let language = language.trim().to_string();
            if !language.is_empty() && !seen.contains(&language) {
                seen.push(language);
            }
        }
        self.languages = seen;
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        errors.require("registered_name", &self.registered_name);

        let email = self.email_address.as_deref().unwrap_or_default();
        if errors.require("email_address", email) {
            errors.max_length("email_address", email, 50);
            errors.format("email_address", email, &EMAIL);
        }

        let telephone = self.telephone_number.as_deref().unwrap_or_default();
        if errors.require("telephone_number", telephone) {
            errors.max_length("telephone_number", telephone, 30);
            errors.format("telephone_number", telephone, &TELEPHONE);
        }

        if let Some(website) = self.website_address.as_deref() {
            if !website.trim().is_empty() {
                errors.max_length("website_address", website, 100);
                errors.format("website_address", website, &WEBSITE);
            }
        }

        if !self.advice_types.any() {
            errors.add("advice_types", "is invalid");
        }

        errors.into_result()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
