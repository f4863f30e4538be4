//! # Firm Indexer
//!
//! Geocode-then-index pipeline for the financial adviser directory. Keeps
//! one search document per publishable firm in OpenSearch, carrying the
//! coordinates of the firm and of each geocoded adviser.
//!
//! ## Architecture
//!
//! 1. **Notifier**: Writers record entity changes on a commit scope; once the
//!    transaction commits, the resulting tasks are queued
//! 2. **Queue**: Carries geocode and index tasks (Kafka or in-process)
//! 3. **Tasks**: Geocode an entity and write its coordinates, or rebuild a
//!    firm's document
//! 4. **Orchestrator**: Pulls tasks, runs them, and retries failures
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`notifier`]: Commit-scoped change notification
//! - [`queue`]: Task model and queue backends
//! - [`tasks`]: Geocode task, task runner, backfill and statistics
//! - [`indexer`]: Publication rule, document builder and index task
//! - [`orchestrator`]: Worker loop
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod errors;
pub mod indexer;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod tasks;

pub use config::{Dependencies, IndexPolicy, PipelineConfig};
pub use errors::{IngestError, QueueError, TaskError};
pub use notifier::{ChangeNotifier, CommitReport, CommitScope};
pub use orchestrator::Orchestrator;
pub use queue::{Task, TaskEnvelope};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
