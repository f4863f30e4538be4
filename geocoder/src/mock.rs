//! Mock geocoder for testing and local development.
//!
//! The `MockGeocoder` can be pre-populated with address → coordinate
//! fixtures, allowing tests to run without network access. Unknown addresses
//! resolve to `NotFound`.
//!
//! # Example
//!
//! ```ignore
//! use geocoder::{Geocoder, MockGeocoder};
//!
//! let geocoder = MockGeocoder::new();
//! geocoder.register("120 Holborn, EC1N 2TD, United Kingdom", Coordinates::new(51.5180697, -0.1085203));
//! let result = geocoder.lookup("120 Holborn, EC1N 2TD, United Kingdom").await;
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use firm_indexer_shared::Coordinates;

use crate::{GeocodeResult, Geocoder};

/// Mock geocoder that answers from fixtures and records every lookup.
pub struct MockGeocoder {
    fixtures: RwLock<HashMap<String, Coordinates>>,
    transient_failure: RwLock<Option<String>>,
    lookups: Mutex<Vec<String>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            fixtures: RwLock::new(HashMap::new()),
            transient_failure: RwLock::new(None),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fixtures(fixtures: HashMap<String, Coordinates>) -> Self {
        let geocoder = Self::new();
        for (address, coordinates) in fixtures {
            geocoder.register(&address, coordinates);
        }
        geocoder
    }

    /// Register the coordinates returned for an address.
    pub fn register(&self, address: &str, coordinates: Coordinates) {
        self.fixtures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), coordinates);
    }

    /// Make every lookup return `TransientError` until cleared with `None`.
    pub fn fail_with(&self, reason: Option<&str>) {
        *self
            .transient_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }

    /// Addresses looked up so far, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.recorded().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.recorded().len()
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<String>> {
        self.lookups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn lookup(&self, address: &str) -> GeocodeResult {
        self.recorded().push(address.to_string());

        if let Some(reason) = self
            .transient_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return GeocodeResult::TransientError(reason);
        }

        self.fixtures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .map(|c| GeocodeResult::Found(Coordinates::new(c.latitude, c.longitude)))
            .unwrap_or(GeocodeResult::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeocoderSource;

    const HOLBORN: &str = "120 Holborn, EC1N 2TD, United Kingdom";

    #[tokio::test]
    async fn test_fixture_lookup() {
        let geocoder = MockGeocoder::new();
        geocoder.register(HOLBORN, Coordinates::new(51.5180697, -0.1085203));

        assert_eq!(
            geocoder.lookup(HOLBORN).await,
            GeocodeResult::Found(Coordinates::new(51.51807, -0.10852))
        );
        assert_eq!(
            geocoder.lookup("1000 Fantasy Ave, ABC 123, United Kingdom").await,
            GeocodeResult::NotFound
        );
        assert_eq!(geocoder.lookup_count(), 2);
        assert_eq!(geocoder.lookups()[0], HOLBORN);
    }

    #[tokio::test]
    async fn test_forced_transient_failure() {
        let geocoder = MockGeocoder::new();
        geocoder.register(HOLBORN, Coordinates::new(51.5, -0.1));
        geocoder.fail_with(Some("provider down"));

        assert_eq!(
            geocoder.lookup(HOLBORN).await,
            GeocodeResult::TransientError("provider down".to_string())
        );

        geocoder.fail_with(None);
        assert!(geocoder.lookup(HOLBORN).await.coordinates().is_some());
    }

    #[tokio::test]
    async fn test_source_builds_mock() {
        let mut fixtures = HashMap::new();
        fixtures.insert(HOLBORN.to_string(), Coordinates::new(51.5, -0.1));

        let geocoder = GeocoderSource::mock(fixtures).into_geocoder().unwrap();
        assert_eq!(
            geocoder.lookup(HOLBORN).await,
            GeocodeResult::Found(Coordinates::new(51.5, -0.1))
        );
    }
}
