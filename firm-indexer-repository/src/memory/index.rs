//! In-memory search index.

use async_trait::async_trait;
use firm_indexer_shared::{FirmDocument, FirmId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::errors::IndexError;
use crate::interfaces::IndexRepository;

/// One call made against the index, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCall {
    EnsureIndex,
    Store(FirmId),
    Delete(FirmId),
}

/// An `IndexRepository` backed by a map, for tests and local runs.
///
/// Records every call so tests can assert on the exact calls made. `set_failing(true)` makes every document operation fail.
#[derive(Default)]
pub struct InMemoryIndex {
    documents: Mutex<HashMap<FirmId, FirmDocument>>,
    calls: Mutex<Vec<IndexCall>>,
    failing: AtomicBool,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn document(&self, id: FirmId) -> Option<FirmDocument> {
        self.documents.lock().await.get(&id).cloned()
    }

    /// The stored document serialized as JSON.
    pub async fn document_json(&self, id: FirmId) -> Option<String> {
        let documents = self.documents.lock().await;
        documents
            .get(&id)
            .and_then(|document| serde_json::to_string(document).ok())
    }

    pub async fn contains(&self, id: FirmId) -> bool {
        self.documents.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }

    pub async fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().await.clone()
    }

    fn check_failing(&self, error: impl FnOnce() -> IndexError) -> Result<(), IndexError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IndexRepository for InMemoryIndex {
    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        self.calls.lock().await.push(IndexCall::EnsureIndex);
        Ok(())
    }

    async fn store(&self, id: FirmId, document: &FirmDocument) -> Result<(), IndexError> {
        self.check_failing(|| IndexError::store("index unavailable"))?;
        self.calls.lock().await.push(IndexCall::Store(id));
        self.documents.lock().await.insert(id, document.clone());
        Ok(())
    }

    async fn delete(&self, id: FirmId) -> Result<(), IndexError> {
        self.check_failing(|| IndexError::delete("index unavailable"))?;
        self.calls.lock().await.push(IndexCall::Delete(id));
        self.documents.lock().await.remove(&id);
        Ok(())
    }
}
