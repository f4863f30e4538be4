//! Office record. A firm's first office is its main office and supplies the
//! firm's published address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ids::{FirmId, OfficeId};
use crate::types::validation::{ValidationErrors, EMAIL, OFFICE_POSTCODE, TELEPHONE, WEBSITE};

pub const COUNTRY: &str = "United Kingdom";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub firm_id: FirmId,
    pub address_line_one: String,
    pub address_line_two: Option<String>,
    pub address_town: String,
    pub address_county: Option<String>,
    pub address_postcode: String,
    pub email_address: Option<String>,
    pub telephone_number: Option<String>,
    pub website: Option<String>,
    pub disabled_access: bool,
    pub created_at: DateTime<Utc>,
}

impl Office {
    /// Create an office with the required address fields. The postcode is upper-cased.
    pub fn new(
        id: OfficeId,
        firm_id: FirmId,
        address_line_one: impl Into<String>,
        address_town: impl Into<String>,
        address_postcode: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut office = Self {
            id,
            firm_id,
            address_line_one: address_line_one.into(),
            address_line_two: None,
            address_town: address_town.into(),
            address_county: None,
            address_postcode: address_postcode.into(),
            email_address: None,
            telephone_number: None,
            website: None,
            disabled_access: false,
            created_at,
        };
        office.normalize();
        office
    }

    pub fn normalize(&mut self) {
        self.address_postcode = self.address_postcode.trim().to_uppercase();
    }

    /// Address sent to the geocoding gateway: line one, line two and postcode,
    /// blanks dropped, followed by the country.
    pub fn full_street_address(&self) -> String {
        [
            Some(self.address_line_one.as_str()),
            self.address_line_two.as_deref(),
            Some(self.address_postcode.as_str()),
            Some(COUNTRY),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// The fields whose change invalidates a stored geocode.
    pub fn address_fields(&self) -> (&str, Option<&str>, &str) {
        (
            &self.address_line_one,
            self.address_line_two.as_deref(),
            &self.address_postcode,
        )
    }

    pub fn telephone_without_spaces(&self) -> Option<String> {
        self.telephone_number
            .as_ref()
            .map(|number| number.replace(' ', ""))
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if errors.require("address_line_one", &self.address_line_one) {
            errors.max_length("address_line_one", &self.address_line_one, 100);
        }
        if let Some(line_two) = self.address_line_two.as_deref() {
            errors.max_length("address_line_two", line_two, 100);
        }
        if errors.require("address_town", &self.address_town) {
            errors.max_length("address_town", &self.address_town, 100);
        }
        if let Some(county) = self.address_county.as_deref() {
            errors.max_length("address_county", county, 100);
        }
        if errors.require("address_postcode", &self.address_postcode) {
            errors.format("address_postcode", &self.address_postcode, &OFFICE_POSTCODE);
        }

        if let Some(email) = non_blank(self.email_address.as_deref()) {
            errors.max_length("email_address", email, 50);
            errors.format("email_address", email, &EMAIL);
        }
        if let Some(telephone) = non_blank(self.telephone_number.as_deref()) {
            errors.max_length("telephone_number", telephone, 30);
            errors.format("telephone_number", telephone, &TELEPHONE);
        }
        if let Some(website) = non_blank(self.website.as_deref()) {
            errors.max_length("website", website, 100);
            errors.format("website", website, &WEBSITE);
        }

        errors.into_result()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Office {
        Office::new(
            OfficeId(1),
            FirmId(1),
            "120 Holborn",
            "London",
            "ec1n 2td",
            Utc::now(),
        )
    }

    #[test]
    fn test_postcode_is_upcased() {
        assert_eq!(office().address_postcode, "EC1N 2TD");
    }

    #[test]
    fn test_full_street_address_skips_blank_lines() {
        let mut office = office();
        assert_eq!(
            office.full_street_address(),
            "120 Holborn, EC1N 2TD, United Kingdom"
        );

        office.address_line_two = Some("Second Floor".to_string());
        assert_eq!(
            office.full_street_address(),
            "120 Holborn, Second Floor, EC1N 2TD, United Kingdom"
        );

        office.address_line_two = Some("  ".to_string());
        assert_eq!(
            office.full_street_address(),
            "120 Holborn, EC1N 2TD, United Kingdom"
        );
    }

    #[test]
    fn test_validation() {
        assert!(office().is_valid());

        let mut office = office();
        office.address_postcode = "EC1N2TD".to_string();
        office.address_town = String::new();
        office.email_address = Some("nope".to_string());

        let errors = office.validate().unwrap_err();
        assert!(errors.has_field("address_postcode"));
        assert!(errors.has_field("address_town"));
        assert!(errors.has_field("email_address"));
    }
}
