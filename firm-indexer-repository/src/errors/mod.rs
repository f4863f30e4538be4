//! Error types for the firm indexer repository.
//!
//! One error type per consumed store: the search index and the relational
//! entity store.

mod index_error;
mod store_error;

pub use index_error::IndexError;
pub use store_error::EntityStoreError;
