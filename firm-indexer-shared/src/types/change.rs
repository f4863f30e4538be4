//! Committed changes to firms, offices and advisers, and the work each one
//! affects.
//!
//! A change record is built by diffing the entity before and after a write.
//! It captures everything downstream scheduling needs (validity, whether the
//! geocodable address moved, main-office status, re-parenting) so the tasks
//! it leads to can run later against a freshly loaded copy.

use serde::{Deserialize, Serialize};

use crate::types::adviser::Adviser;
use crate::types::coordinates::CoordinateTarget;
use crate::types::firm::Firm;
use crate::types::ids::{AdviserId, FirmId, OfficeId};
use crate::types::office::Office;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityChange {
    FirmSaved {
        firm_id: FirmId,
        valid: bool,
    },
    FirmDestroyed {
        firm_id: FirmId,
    },
    OfficeSaved {
        office_id: OfficeId,
        firm_id: FirmId,
        valid: bool,
        address_changed: bool,
        is_main_office: bool,
        was_main_office: bool,
    },
    OfficeDestroyed {
        office_id: OfficeId,
        firm_id: FirmId,
        was_main_office: bool,
    },
    AdviserSaved {
        adviser_id: AdviserId,
        firm_id: FirmId,
        valid: bool,
        address_changed: bool,
        /// The adviser carried coordinates before the write.
        was_geocoded: bool,
        previous_firm_id: Option<FirmId>,
    },
    AdviserDestroyed {
        adviser_id: AdviserId,
        firm_id: FirmId,
    },
}

/// Downstream work a change leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affect {
    /// Geocode the target. The flag records whether its address changed.
    Geocode(CoordinateTarget, bool),
    /// Rebuild the firm's index document.
    Reindex(FirmId),
}

impl EntityChange {
    /// A firm was created or updated. A firm's geocodable address belongs to
    /// its main office, so saving the firm row never moves it.
    pub fn firm_saved(after: &Firm) -> Self {
        Self::FirmSaved {
            firm_id: after.id,
            valid: after.is_valid(),
        }
    }

    pub fn firm_destroyed(firm_id: FirmId) -> Self {
        Self::FirmDestroyed { firm_id }
    }

    /// An office was created or updated.
    ///
    /// `main_before` and `main_after` are the firm's main office id before and
    /// after the write. When the main office changes identity the firm's
    /// address changes with it.
    pub fn office_saved(
        before: Option<&Office>,
        after: &Office,
        main_before: Option<OfficeId>,
        main_after: Option<OfficeId>,
    ) -> Self {
        let is_main_office = main_after == Some(after.id);
        let was_main_office = main_before == Some(after.id);
        let fields_changed = before.is_none_or(|b| b.address_fields() != after.address_fields());

        Self::OfficeSaved {
            office_id: after.id,
            firm_id: after.firm_id,
            valid: after.is_valid(),
            address_changed: fields_changed || is_main_office != was_main_office,
            is_main_office,
            was_main_office,
        }
    }

    pub fn office_destroyed(office: &Office, was_main_office: bool) -> Self {
        Self::OfficeDestroyed {
            office_id: office.id,
            firm_id: office.firm_id,
            was_main_office,
        }
    }

    /// An adviser was created or updated. A new adviser counts as an address
    /// change.
    pub fn adviser_saved(before: Option<&Adviser>, after: &Adviser) -> Self {
        Self::AdviserSaved {
            adviser_id: after.id,
            firm_id: after.firm_id,
            valid: after.is_valid(),
            address_changed: before.is_none_or(|b| b.postcode != after.postcode),
            was_geocoded: before.is_some_and(|b| b.coordinates.is_some()),
            previous_firm_id: before
                .filter(|b| b.firm_id != after.firm_id)
                .map(|b| b.firm_id),
        }
    }

    pub fn adviser_destroyed(adviser: &Adviser) -> Self {
        Self::AdviserDestroyed {
            adviser_id: adviser.id,
            firm_id: adviser.firm_id,
        }
    }

    /// The firm whose document reflects this change.
    pub fn firm_id(&self) -> FirmId {
        match self {
            Self::FirmSaved { firm_id, .. }
            | Self::FirmDestroyed { firm_id }
            | Self::OfficeSaved { firm_id, .. }
            | Self::OfficeDestroyed { firm_id, .. }
            | Self::AdviserSaved { firm_id, .. }
            | Self::AdviserDestroyed { firm_id, .. } => *firm_id,
        }
    }

    /// Whether the change leaves a firm that may need its document refreshed
    /// even when no geocode follows. Destroy paths and office edits always do.
    pub fn always_reindexes(&self) -> bool {
        matches!(
            self,
            Self::FirmDestroyed { .. }
                | Self::OfficeSaved { .. }
                | Self::OfficeDestroyed { .. }
                | Self::AdviserDestroyed { .. }
        )
    }

    /// The work this change leads to, before any index policy is applied.
    ///
    /// Saves of valid firms and advisers geocode the entity; the resulting
    /// index refresh is left to the geocode task. Office edits touching the
    /// main office geocode the firm, and every office edit reindexes it.
    /// Re-parenting an adviser reindexes the firm it left and the firm it
    /// joined. Moving a geocoded adviser's postcode reindexes its firm at
    /// once, since the document still places it at the old postcode.
    pub fn affects(&self) -> Vec<Affect> {
        match *self {
            Self::FirmSaved { firm_id, valid } => {
                if valid {
                    vec![Affect::Geocode(CoordinateTarget::Firm(firm_id), false)]
                } else {
                    vec![]
                }
            }
            Self::FirmDestroyed { firm_id } => vec![Affect::Reindex(firm_id)],
            Self::OfficeSaved {
                firm_id,
                valid,
                address_changed,
                is_main_office,
                was_main_office,
                ..
            } => {
                let mut affects = Vec::with_capacity(2);
                if valid && (is_main_office || was_main_office) {
                    affects.push(Affect::Geocode(
                        CoordinateTarget::Firm(firm_id),
                        address_changed,
                    ));
                }
                affects.push(Affect::Reindex(firm_id));
                affects
            }
            Self::OfficeDestroyed {
                firm_id,
                was_main_office,
                ..
            } => {
                let mut affects = Vec::with_capacity(2);
                if was_main_office {
                    affects.push(Affect::Geocode(CoordinateTarget::Firm(firm_id), true));
                }
                affects.push(Affect::Reindex(firm_id));
                affects
            }
            Self::AdviserSaved {
                adviser_id,
                firm_id,
                valid,
                address_changed,
                was_geocoded,
                previous_firm_id,
            } => {
                let mut affects = Vec::with_capacity(3);
                if valid {
                    affects.push(Affect::Geocode(
                        CoordinateTarget::Adviser(adviser_id),
                        address_changed,
                    ));
                }
                // Both documents list the adviser differently after a move
                if let Some(previous) = previous_firm_id {
                    affects.push(Affect::Reindex(previous));
                    affects.push(Affect::Reindex(firm_id));
                } else if address_changed && was_geocoded {
                    affects.push(Affect::Reindex(firm_id));
                }
                affects
            }
            Self::AdviserDestroyed { firm_id, .. } => vec![Affect::Reindex(firm_id)],
        }
    }
}
