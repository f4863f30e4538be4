//! Geocoding gateway: resolves a postal address to a coordinate pair.
//!
//! This crate provides:
//! - [`GeocoderSource`] config enum for choosing between mock and live geocoders
//! - [`Geocoder`] trait for abstracting the lookup
//! - [`GoogleGeocoder`] production client for the Google Geocoding API
//! - [`MockGeocoder`] mock client with pre-configured address → coordinate fixtures
//!
//! A lookup never fails with an error. The three outcomes are carried by
//! [`GeocodeResult`], so callers can treat "this address has no match"
//! differently from "the provider could not answer".
//!
//! ## Usage
//!
//! ```ignore
//! use geocoder::GeocoderSource;
//!
//! let geocoder = GeocoderSource::live(GoogleConfig::new(api_key)).into_geocoder()?;
//! match geocoder.lookup("120 Holborn, EC1N 2TD, United Kingdom").await {
//!     GeocodeResult::Found(coordinates) => { /* ... */ }
//!     GeocodeResult::NotFound => { /* ... */ }
//!     GeocodeResult::TransientError(reason) => { /* ... */ }
//! }
//! ```

mod google;
mod mock;

pub use google::{GoogleConfig, GoogleGeocoder};
pub use mock::MockGeocoder;

use std::collections::HashMap;

use async_trait::async_trait;
use firm_indexer_shared::Coordinates;

#[derive(Debug, thiserror::Error)]
pub enum GeocoderError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GeocoderError>;

/// Outcome of one address lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeResult {
    /// The address resolved. Coordinates are rounded to six decimal places.
    Found(Coordinates),
    /// The provider answered and the address has no match.
    NotFound,
    /// The provider could not answer: network failure, quota, server error
    /// or an unreadable response. A later attempt may succeed.
    TransientError(String),
}

impl GeocodeResult {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Found(coordinates) => Some(*coordinates),
            _ => None,
        }
    }
}

/// Address to coordinates lookup.
///
/// Implementations make at most one outbound request per call and never
/// retry; retry policy belongs to whoever schedules the lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, address: &str) -> GeocodeResult;
}

/// Configuration for the geocoding source.
#[derive(Debug, Clone)]
pub enum GeocoderSource {
    /// Use the mock geocoder with pre-configured address → coordinates fixtures.
    Mock(HashMap<String, Coordinates>),

    /// Call the Google Geocoding API.
    Live(GoogleConfig),
}

impl GeocoderSource {
    pub fn mock(fixtures: HashMap<String, Coordinates>) -> Self {
        Self::Mock(fixtures)
    }

    pub fn live(config: GoogleConfig) -> Self {
        Self::Live(config)
    }

    /// Create the appropriate `Geocoder` implementation.
    pub fn into_geocoder(self) -> Result<Box<dyn Geocoder>> {
        Ok(match self {
            Self::Mock(fixtures) => Box::new(MockGeocoder::with_fixtures(fixtures)),
            Self::Live(config) => Box::new(GoogleGeocoder::new(config)?),
        })
    }
}
