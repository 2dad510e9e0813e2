//! HTTP client for the live metadata endpoint.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use super::Fetcher;
use super::error::UpstreamError;
use super::validate_station;

/// Default base URL for the live metadata API.
pub const DEFAULT_BASE_URL: &str = "https://www.radiofrance.fr/fip/api/live";

/// Default request deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL; the station is passed as the `webradio` query parameter
    pub base_url: String,
    /// Whole-request deadline, covering connect and body
    pub timeout: Duration,
    /// Reject payloads whose `stationName` differs from the requested station
    pub validate_station: bool,
}

impl UpstreamConfig {
    /// Create a config pointing at `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            validate_station: true,
        }
    }

    /// Set the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable `stationName` validation.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_station = enabled;
        self
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Fetches metadata from the real upstream over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    base_url: String,
    validate_station: bool,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            validate_station: config.validate_station,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, station: &str) -> Result<Bytes, UpstreamError> {
        tracing::info!(station, base_url = %self.base_url, "fetching upstream metadata");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("webradio", station)])
            .send()
            .await
            .map_err(|source| UpstreamError::Unreachable {
                station: station.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(UpstreamError::Status {
                station: station.to_string(),
                code: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Body {
                station: station.to_string(),
                source,
            })?;

        if self.validate_station {
            validate_station(station, &body)?;
        }

        Ok(body)
    }
}
