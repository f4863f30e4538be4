//! Dependency initialization and wiring for the firm indexer.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use firm_indexer_repository::{
    EntityStore, IndexConfig, IndexRepository, OpenSearchIndexRepository, PostgresEntityStore,
};
use geocoder::{Geocoder, GeocoderSource, GoogleConfig};
use sqlx::postgres::PgPoolOptions;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::notifier::ChangeNotifier;
use crate::orchestrator::Orchestrator;
use crate::queue::{
    ChannelTaskQueue, KafkaQueueConfig, KafkaTaskQueue, KafkaTaskSource, TaskQueue, TaskSource,
};
use crate::tasks::{enqueue_full_reindex, PipelineStats, TaskRunner};
use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index alias.
const DEFAULT_INDEX_ALIAS: &str = "firms";

/// Default database pool size.
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse connection mode from environment variable.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    /// Defaults to "fail-fast" if not set or invalid.
    fn from_env() -> Self {
        Self::parse(env::var("OPENSEARCH_CONNECTION_MODE").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::FailFast;
        };
        match value.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(value = %value, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'fail-fast'");
                Self::FailFast
            }
        }
    }
}

/// Which backend carries tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueBackend {
    Kafka,
    Memory,
}

impl QueueBackend {
    fn from_env() -> Self {
        match env::var("TASK_QUEUE")
            .unwrap_or_else(|_| "kafka".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" | "in-memory" => Self::Memory,
            "kafka" => Self::Kafka,
            _ => {
                warn!("Invalid TASK_QUEUE, defaulting to 'kafka'");
                Self::Kafka
            }
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Notifier for writers sharing this process.
    pub notifier: ChangeNotifier,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_ALIAS`: Index alias name (default: "firms")
    /// - `FIRMS_INDEX_VERSION`: Index version number (default: 0)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `GEOCODER_API_KEY`: Google Geocoding API key (required)
    /// - `GEOCODER_URL`, `GEOCODER_REGION`, `GEOCODER_TIMEOUT_SECS`: Geocoder overrides
    /// - `TASK_QUEUE`: "kafka" or "memory" (default: kafka)
    /// - `REINDEX_ON_STARTUP`: Enqueue every firm for reindexing (default: false)
    ///
    /// Kafka settings are read by [`KafkaQueueConfig::from_env`], pipeline
    /// settings by [`PipelineConfig::from_env`].
    pub async fn new() -> Result<Self, IndexingError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| IndexingError::config("DATABASE_URL must be set"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS);
        let opensearch_url =
            env::var("OPENSEARCH_URL").unwrap_or_else(|_| DEFAULT_OPENSEARCH_URL.to_string());
        let connection_mode = ConnectionMode::from_env();
        let retry_interval = env::var("OPENSEARCH_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);
        let queue_backend = QueueBackend::from_env();
        let pipeline = PipelineConfig::from_env();

        info!(
            opensearch_url = %opensearch_url,
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval,
            queue_backend = ?queue_backend,
            index_policy = %pipeline.index_policy,
            "Initializing dependencies"
        );

        let index_alias =
            env::var("INDEX_ALIAS").unwrap_or_else(|_| DEFAULT_INDEX_ALIAS.to_string());
        let index_version = env::var("FIRMS_INDEX_VERSION")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        let index_config = IndexConfig::new(index_alias, index_version);

        // Exits in fail-fast mode if the index and alias cannot be created
        let repository: Arc<dyn IndexRepository> = Arc::new(
            Self::connect_to_opensearch(
                &opensearch_url,
                index_config,
                connection_mode,
                Duration::from_secs(retry_interval),
            )
            .await?,
        );

        info!("OpenSearch connection established");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&database_url)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect to database: {}", e)))?;
        let store: Arc<dyn EntityStore> = Arc::new(
            PostgresEntityStore::new(pool)
                .await
                .map_err(|e| IndexingError::config(format!("Failed to create entity store: {}", e)))?,
        );

        info!("Database connection established");

        let geocoder: Arc<dyn Geocoder> = Arc::from(
            GeocoderSource::live(Self::geocoder_config()?)
                .into_geocoder()
                .map_err(|e| IndexingError::config(format!("Failed to create geocoder: {}", e)))?,
        );

        let (queue, source): (Arc<dyn TaskQueue>, Arc<dyn TaskSource>) = match queue_backend {
            QueueBackend::Kafka => {
                let kafka_config = KafkaQueueConfig::from_env();
                let queue = KafkaTaskQueue::new(&kafka_config).map_err(|e| {
                    IndexingError::config(format!("Failed to create Kafka producer: {}", e))
                })?;
                let source = KafkaTaskSource::new(&kafka_config).map_err(|e| {
                    IndexingError::config(format!("Failed to create Kafka consumer: {}", e))
                })?;
                info!(topic = %kafka_config.topic, "Kafka task queue created");
                (Arc::new(queue), Arc::new(source))
            }
            QueueBackend::Memory => {
                let (queue, source) = ChannelTaskQueue::new();
                (Arc::new(queue), Arc::new(source))
            }
        };

        if Self::reindex_on_startup() {
            enqueue_full_reindex(store.as_ref(), queue.as_ref())
                .await
                .map_err(|e| IndexingError::config(format!("Failed to enqueue reindex: {}", e)))?;
        }

        let stats = Arc::new(PipelineStats::new());
        let runner = Arc::new(TaskRunner::new(
            store,
            geocoder,
            repository,
            queue.clone(),
            &pipeline,
            stats,
        ));
        let notifier = ChangeNotifier::new(queue.clone(), pipeline.index_policy);
        let orchestrator = Orchestrator::new(source, runner, queue, pipeline);

        Ok(Self {
            orchestrator,
            notifier,
        })
    }

    fn geocoder_config() -> Result<GoogleConfig, IndexingError> {
        let api_key = env::var("GEOCODER_API_KEY")
            .map_err(|_| IndexingError::config("GEOCODER_API_KEY must be set"))?;

        let mut config = GoogleConfig::new(api_key);
        if let Ok(url) = env::var("GEOCODER_URL") {
            config = config.with_base_url(url);
        }
        if let Ok(region) = env::var("GEOCODER_REGION") {
            config.region = region;
        }
        if let Some(secs) = env::var("GEOCODER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn reindex_on_startup() -> bool {
        env::var("REINDEX_ON_STARTUP")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchIndexRepository, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url, index_config.clone()).await {
                Ok(repository) => return Ok(repository),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Create the repository and make sure the index and alias exist.
    async fn try_connect_opensearch(
        url: &str,
        index_config: IndexConfig,
    ) -> Result<OpenSearchIndexRepository, IndexingError> {
        let repository = OpenSearchIndexRepository::new(url, index_config)
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch repository: {}", e))
            })?;

        repository
            .ensure_index_exists()
            .await
            .map_err(|e| IndexingError::config(format!("Failed to ensure index exists: {}", e)))?;

        Ok(repository)
    }
}
