//! Coordinate pair and the geocoding capability shared by addressable entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ids::{AdviserId, FirmId};

/// Number of decimal places kept for each coordinate component.
pub const COORDINATE_PRECISION: i32 = 6;

/// A resolved (latitude, longitude) pair.
///
/// The pair only exists as a whole: entities hold an `Option<Coordinates>`,
/// so a half-set pair cannot be represented. Both components are rounded to
/// six decimal places on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair, rounding each component to six decimal places.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: round_component(latitude),
            longitude: round_component(longitude),
        }
    }

    /// Build a pair from two nullable columns.
    ///
    /// Returns `Some` only when both columns hold a value. A stored half pair
    /// reads as "not geocoded".
    pub fn from_columns(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Split an optional pair back into its two nullable columns.
    pub fn into_columns(coordinates: Option<Self>) -> (Option<f64>, Option<f64>) {
        match coordinates {
            Some(c) => (Some(c.latitude), Some(c.longitude)),
            None => (None, None),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

fn round_component(value: f64) -> f64 {
    let factor = 10f64.powi(COORDINATE_PRECISION);
    (value * factor).round() / factor
}

/// The row whose coordinate columns a geocode result is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateTarget {
    Firm(FirmId),
    Adviser(AdviserId),
}

impl fmt::Display for CoordinateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firm(id) => write!(f, "firm:{}", id),
            Self::Adviser(id) => write!(f, "adviser:{}", id),
        }
    }
}

/// Geocoding state attached to any entity with a postal address.
///
/// Implementors expose their coordinate pair and the address string the
/// geocoding gateway resolves. Whether the address changed is not tracked on
/// the entity itself: a background task always works on a freshly loaded
/// copy, so the caller passes the flag captured when the change was committed.
pub trait Geocodable {
    /// The entity's current coordinates, if geocoded.
    fn coordinates(&self) -> Option<Coordinates>;

    /// Replace the coordinate pair. `None` clears both components.
    fn set_coordinates(&mut self, coordinates: Option<Coordinates>);

    /// The full postal address sent to the geocoding gateway, if any.
    fn full_street_address(&self) -> Option<String>;

    /// True when both coordinate components are present.
    fn is_geocoded(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Whether a geocoding lookup is due for this entity.
    fn needs_geocoding(&self, address_changed: bool) -> bool {
        !self.is_geocoded() || address_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pin {
        coordinates: Option<Coordinates>,
    }

    impl Geocodable for Pin {
        fn coordinates(&self) -> Option<Coordinates> {
            self.coordinates
        }

        fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
            self.coordinates = coordinates;
        }

        fn full_street_address(&self) -> Option<String> {
            Some("EC1N 2TD, United Kingdom".to_string())
        }
    }

    #[test]
    fn test_new_rounds_to_six_places() {
        let coordinates = Coordinates::new(51.5180697, -0.1085203);
        assert_eq!(coordinates.latitude, 51.51807);
        assert_eq!(coordinates.longitude, -0.10852);
    }

    #[test]
    fn test_from_columns_requires_both_components() {
        assert!(Coordinates::from_columns(Some(1.0), None).is_none());
        assert!(Coordinates::from_columns(None, Some(1.0)).is_none());
        assert!(Coordinates::from_columns(None, None).is_none());
        assert_eq!(
            Coordinates::from_columns(Some(1.0), Some(2.0)),
            Some(Coordinates::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_into_columns_clears_both() {
        assert_eq!(Coordinates::into_columns(None), (None, None));
        assert_eq!(
            Coordinates::into_columns(Some(Coordinates::new(1.5, -2.5))),
            (Some(1.5), Some(-2.5))
        );
    }

    #[test]
    fn test_geocoded_and_needs_geocoding() {
        let mut pin = Pin { coordinates: None };
        assert!(!pin.is_geocoded());
        assert!(pin.needs_geocoding(false));

        pin.set_coordinates(Some(Coordinates::new(1.0, 1.0)));
        assert!(pin.is_geocoded());
        assert!(!pin.needs_geocoding(false));
        assert!(pin.needs_geocoding(true));

        pin.set_coordinates(None);
        assert!(!pin.is_geocoded());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(CoordinateTarget::Firm(FirmId(3)).to_string(), "firm:3");
        assert_eq!(
            CoordinateTarget::Adviser(AdviserId(9)).to_string(),
            "adviser:9"
        );
    }
}
