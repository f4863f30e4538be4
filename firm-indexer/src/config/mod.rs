//! Configuration and dependency initialization.

mod dependencies;
mod pipeline;

pub use dependencies::{ConnectionMode, Dependencies};
pub use pipeline::{IndexPolicy, PipelineConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS};
