//! OpenSearch index repository implementation.
//!
//! Documents are addressed as `<alias>/<firm id>`. The alias points at a
//! versioned index so the mapping can be rebuilt under a new version and the
//! alias swapped.

use async_trait::async_trait;
use firm_indexer_shared::{FirmDocument, FirmId};
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesPutAliasParts},
    DeleteParts, IndexParts, OpenSearch,
};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::IndexError;
use crate::interfaces::IndexRepository;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};

/// OpenSearch index repository.
///
/// # Example
///
/// ```ignore
/// use firm_indexer_repository::opensearch::{IndexConfig, OpenSearchIndexRepository};
/// let config = IndexConfig::new("firms", 0);
/// let repository = OpenSearchIndexRepository::new("http://localhost:9200", config).await?;
/// repository.ensure_index_exists().await?;
/// repository.delete(FirmId(42)).await?;
/// ```
pub struct OpenSearchIndexRepository {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchIndexRepository {
    /// Create a new repository connected to the specified URL.
    ///
    /// No request is made here; connectivity is first exercised by
    /// `ensure_index_exists`.
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, IndexError> {
        let parsed_url = Url::parse(url).map_err(|e| IndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch index repository"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    fn document_id(id: FirmId) -> String {
        id.to_string()
    }
}

#[async_trait]
impl IndexRepository for OpenSearchIndexRepository {
    /// Create the versioned index with its mappings if it is missing, then
    /// point the alias at it.
    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        let index_name = self.index_config.versioned_index_name();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&index_name]))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if exists.status_code().as_u16() == 404 {
            let response = self
                .client
                .indices()
                .create(IndicesCreateParts::Index(&index_name))
                .body(get_index_settings(Some(self.index_config.version)))
                .send()
                .await
                .map_err(|e| IndexError::index_creation(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %error_body, "Index creation failed");
                return Err(IndexError::index_creation(format!(
                    "Creating {} failed with status {}: {}",
                    index_name, status, error_body
                )));
            }
            info!(index = %index_name, "Created index");
        } else if !exists.status_code().is_success() {
            return Err(IndexError::connection(format!(
                "Index existence check returned status {}",
                exists.status_code()
            )));
        }

        let response = self
            .client
            .indices()
            .put_alias(IndicesPutAliasParts::IndexName(
                &[&index_name],
                &self.index_config.alias,
            ))
            .send()
            .await
            .map_err(|e| IndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Alias creation failed");
            return Err(IndexError::index_creation(format!(
                "Aliasing {} to {} failed with status {}: {}",
                self.index_config.alias, index_name, status, error_body
            )));
        }

        debug!(alias = %self.index_config.alias, index = %index_name, "Index ready");
        Ok(())
    }

    /// Put the full document, replacing any previous version.
    async fn store(&self, id: FirmId, document: &FirmDocument) -> Result<(), IndexError> {
        let doc_id = Self::document_id(id);
        let body = serde_json::to_value(document)?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.alias, &doc_id))
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::store(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Store request failed");
            return Err(IndexError::store(format!(
                "Store failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %doc_id, "Document stored");
        Ok(())
    }

    async fn delete(&self, id: FirmId) -> Result<(), IndexError> {
        let doc_id = Self::document_id(id);

        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index_config.alias, &doc_id))
            .send()
            .await
            .map_err(|e| IndexError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(IndexError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %doc_id, "Document deleted");
        Ok(())
    }
}
