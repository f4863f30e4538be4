//! Identifier types for the relational entities.
//!
//! Each entity is keyed by its relational primary key. The newtypes keep a
//! firm id from being passed where an adviser id is expected; they serialize
//! as plain integers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw primary key.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Primary key of a firm.
    FirmId
);
entity_id!(
    /// Primary key of an office.
    OfficeId
);
entity_id!(
    /// Primary key of an adviser.
    AdviserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_raw_id() {
        assert_eq!(FirmId(42).to_string(), "42");
        assert_eq!(AdviserId::from(7).get(), 7);
    }

    #[test]
    fn test_serializes_transparently() {
        let json = serde_json::to_string(&OfficeId(12)).unwrap();
        assert_eq!(json, "12");

        let id: FirmId = serde_json::from_str("99").unwrap();
        assert_eq!(id, FirmId(99));
    }
}
