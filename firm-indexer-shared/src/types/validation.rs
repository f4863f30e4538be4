//! Data-integrity rules shared by the entity validators.
//!
//! Entities that fail these rules are never geocoded or published. The rules
//! mirror the ones the onboarding application enforces on save.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub(crate) static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+@.+\..+").expect("valid email pattern"));

pub(crate) static TELEPHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[0-9 ]+\z").expect("valid telephone pattern"));

pub(crate) static WEBSITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\Ahttps?://\S+\.\S+").expect("valid website pattern"));

pub(crate) static OFFICE_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A[A-Z\d]{1,4} [A-Z\d]{1,3}\z").expect("valid office postcode pattern")
});

pub(crate) static ADVISER_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A[A-Z\d]{1,4} ?[A-Z\d]{1,3}\z").expect("valid adviser postcode pattern")
});

pub(crate) static REFERENCE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[A-Z]{3}[0-9]{5}\z").expect("valid reference pattern"));

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

/// All rules an entity failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed rule.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// True if any failed rule concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Turn the collected errors into a result.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub(crate) fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, "can't be blank");
            false
        } else {
            true
        }
    }

    pub(crate) fn max_length(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("is too long (maximum is {} characters)", max));
        }
    }

    pub(crate) fn format(&mut self, field: &'static str, value: &str, pattern: &Regex) {
        if !pattern.is_match(value) {
            self.add(field, "is invalid");
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}
