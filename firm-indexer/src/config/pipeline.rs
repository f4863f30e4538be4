//! Pipeline behaviour settings.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default number of deliveries a task gets before it is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry. Later retries wait proportionally
/// longer.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;

/// When the firm document is refreshed after a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Every firm, office and adviser commit schedules `index_firm`, and a
    /// geocode that finds nothing still refreshes the document.
    #[default]
    Always,
    /// Firm and adviser saves only geocode; the document is refreshed once
    /// the entity holds coordinates, or when a pair it held is cleared.
    /// Office edits and destroys still reindex.
    OnGeocodeSuccess,
}

impl IndexPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OnGeocodeSuccess => "on-geocode-success",
        }
    }

    /// Whether every committed change schedules `index_firm` directly.
    pub fn indexes_on_commit(&self) -> bool {
        *self == Self::Always
    }

    /// Whether a geocode that did not produce coordinates still refreshes
    /// the firm document when the entity had none to begin with.
    pub fn indexes_after_failed_geocode(&self) -> bool {
        *self == Self::Always
    }
}

impl fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "on-geocode-success" | "on_geocode_success" => Ok(Self::OnGeocodeSuccess),
            other => Err(format!("unknown index policy '{}'", other)),
        }
    }
}

/// Settings shared by the task runner and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub index_policy: IndexPolicy,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_policy: IndexPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl PipelineConfig {
    pub fn with_policy(index_policy: IndexPolicy) -> Self {
        Self {
            index_policy,
            ..Self::default()
        }
    }

    /// Read the settings from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_POLICY`: "always" or "on-geocode-success" (default: always)
    /// - `TASK_MAX_ATTEMPTS`: Deliveries before a task is abandoned (default: 5)
    /// - `TASK_RETRY_BACKOFF_MS`: Base retry delay in milliseconds (default: 2000)
    pub fn from_env() -> Self {
        let index_policy = match env::var("INDEX_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Invalid INDEX_POLICY, defaulting to 'always'");
                IndexPolicy::Always
            }),
            Err(_) => IndexPolicy::Always,
        };
        let max_attempts = env::var("TASK_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let retry_backoff_ms = env::var("TASK_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_BACKOFF_MS);

        Self {
            index_policy,
            max_attempts,
            retry_backoff: Duration::from_millis(retry_backoff_ms),
        }
    }

    /// Delay before delivering attempt `attempt + 1`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt.max(1))
    }
}
