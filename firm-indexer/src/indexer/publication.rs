//! Which firms have a document in the search index.

use firm_indexer_shared::FirmGraph;

/// A firm is published once it has a main office.
///
/// Advisers are never published on their own; they appear nested in their
/// firm's document when geocoded. Registration status is left to whoever
/// queries the index.
pub fn is_publishable(graph: &FirmGraph) -> bool {
    graph.main_office().is_some()
}
