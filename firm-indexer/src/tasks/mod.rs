//! Background tasks: geocoding, indexing and backfill.

pub mod backfill;
mod geocode;
mod runner;
mod stats;

pub use backfill::enqueue_full_reindex;
pub use geocode::{GeocodeOutcome, Geocoding};
pub use runner::{TaskOutcome, TaskRunner};
pub use stats::{PipelineStats, StatsSnapshot};
