//! OpenSearch implementation of the index repository.
//!
//! This module provides a concrete implementation of `IndexRepository`
//! using OpenSearch as the backend.

mod index_config;
mod provider;

pub use index_config::IndexConfig;
pub use provider::OpenSearchIndexRepository;
