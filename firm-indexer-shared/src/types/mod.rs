//! This module defines the core data structures used across the firm indexer.
//! It re-exports the entity, coordinate and document types.

pub mod adviser;
pub mod change;
pub mod coordinates;
pub mod firm;
pub mod firm_document;
pub mod firm_graph;
pub mod ids;
pub mod office;
pub mod validation;

pub use adviser::Adviser;
pub use change::{Affect, EntityChange};
pub use coordinates::{CoordinateTarget, Coordinates, Geocodable};
pub use firm::Firm;
pub use firm_document::FirmDocument;
pub use firm_graph::FirmGraph;
pub use ids::{AdviserId, FirmId, OfficeId};
pub use office::Office;
