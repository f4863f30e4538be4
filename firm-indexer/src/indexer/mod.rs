//! Index side of the pipeline: which firms are published, what their
//! documents contain, and the task that writes them.

mod document_builder;
mod firm_indexer;
mod publication;

pub use document_builder::build_document;
pub use firm_indexer::{FirmIndexer, IndexOutcome};
pub use publication::is_publishable;
