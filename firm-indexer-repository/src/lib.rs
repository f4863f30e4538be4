//! # Firm Indexer Repository
//!
//! This crate provides traits and implementations for the two stores the
//! firm indexer consumes: the search index holding firm documents, and the
//! relational store holding firms, offices and advisers. It includes the
//! error types, OpenSearch and PostgreSQL implementations, and in-memory
//! implementations for tests and local runs.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;

pub use errors::{EntityStoreError, IndexError};
pub use interfaces::{EntityStore, IndexRepository};
pub use memory::{InMemoryEntityStore, InMemoryIndex, IndexCall};
pub use opensearch::{IndexConfig, OpenSearchIndexRepository};
pub use postgres::PostgresEntityStore;
