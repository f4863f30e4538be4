//! # Firm Indexer Shared
//!
//! This crate defines the domain types shared across the firm indexer: the
//! firm, office and adviser records read from the relational store, the
//! coordinate capability they have in common, the change records produced
//! when they are written, and the denormalized document written to the
//! search index.

pub mod types;

pub use types::adviser::{Adviser, TRAVEL_DISTANCES};
pub use types::change::{Affect, EntityChange};
pub use types::coordinates::{CoordinateTarget, Coordinates, Geocodable};
pub use types::firm::{AdviceTypes, Firm};
pub use types::firm_document::{
    advice_percentage, AdviserSummary, FirmDocument, Location, OfficeSummary,
};
pub use types::firm_graph::{FirmGraph, ReferenceData};
pub use types::ids::{AdviserId, FirmId, OfficeId};
pub use types::office::{Office, COUNTRY};
pub use types::validation::{ValidationError, ValidationErrors};
