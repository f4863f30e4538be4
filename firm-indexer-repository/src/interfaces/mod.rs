//! Interface definitions for the consumed stores.
//!
//! The traits allow dependency injection of the search index and the
//! relational store, so the pipeline runs unchanged against OpenSearch and
//! PostgreSQL or against the in-memory implementations.

mod entity_store;
mod index_repository;

pub use entity_store::EntityStore;
pub use index_repository::IndexRepository;
