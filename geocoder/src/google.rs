//! Google Geocoding API client.

use std::time::Duration;

use async_trait::async_trait;
use firm_indexer_shared::Coordinates;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{GeocodeResult, Geocoder, GeocoderError, Result};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";
pub const DEFAULT_REGION: &str = "uk";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const GEOCODE_PATH: &str = "/maps/api/geocode/json";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: String,
    /// Region bias passed with every lookup.
    pub region: String,
    pub timeout: Duration,
}

impl GoogleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeCandidate>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeCandidate {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Production geocoder backed by the Google Geocoding API.
///
/// # Example
///
/// ```ignore
/// use geocoder::{GoogleConfig, GoogleGeocoder};
///
/// let geocoder = GoogleGeocoder::new(GoogleConfig::new("api-key"))?;
/// let result = geocoder.lookup("120 Holborn, EC1N 2TD, United Kingdom").await;
/// ```
pub struct GoogleGeocoder {
    config: GoogleConfig,
    client: ReqwestClient,
}

impl GoogleGeocoder {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GeocoderError::Config("api key is empty".to_string()));
        }

        let client = ReqwestClient::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            GEOCODE_PATH
        )
    }

    fn interpret(address: &str, response: GeocodeResponse) -> GeocodeResult {
        match response.status.as_str() {
            "OK" => match response.results.first() {
                Some(candidate) => {
                    let location = &candidate.geometry.location;
                    GeocodeResult::Found(Coordinates::new(location.lat, location.lng))
                }
                None => GeocodeResult::NotFound,
            },
            "ZERO_RESULTS" => GeocodeResult::NotFound,
            status => {
                let reason = match response.error_message {
                    Some(message) => format!("{}: {}", status, message),
                    None => status.to_string(),
                };
                warn!(address = %address, reason = %reason, "Geocoding provider refused lookup");
                GeocodeResult::TransientError(reason)
            }
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn lookup(&self, address: &str) -> GeocodeResult {
        let response = match self
            .client
            .get(self.endpoint())
            .query(&[
                ("address", address),
                ("key", self.config.api_key.as_str()),
                ("region", self.config.region.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(address = %address, error = %e, "Geocoding request failed");
                return GeocodeResult::TransientError(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(address = %address, status = %status, "Geocoding provider returned an error status");
            return GeocodeResult::TransientError(format!("HTTP {}", status));
        }

        let body = match response.json::<GeocodeResponse>().await {
            Ok(body) => body,
            Err(e) => {
                warn!(address = %address, error = %e, "Geocoding response could not be decoded");
                return GeocodeResult::TransientError(e.to_string());
            }
        };

        let result = Self::interpret(address, body);
        debug!(address = %address, result = ?result, "Geocoded address");
        result
    }
}
