//! Upstream metadata provider.
//!
//! The proxy talks to a single upstream endpoint that returns live metadata
//! for one webradio station per request. This module defines the [`Fetcher`]
//! seam the cache depends on, the real HTTP implementation and an offline
//! mock.
//!
//! A fetch is exactly one request: no retries and no caching happen here.

mod client;
mod error;
mod mock;

use async_trait::async_trait;
use axum::body::Bytes;

pub use client::{DEFAULT_BASE_URL, HttpFetcher, UpstreamConfig};
pub use error::UpstreamError;
pub use mock::MockFetcher;

/// Something that can fetch the raw metadata payload for a station.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the metadata for `station`, returning the response body verbatim.
    async fn fetch(&self, station: &str) -> Result<Bytes, UpstreamError>;
}

/// Check that `body` is a JSON object whose `stationName` equals `station`.
///
/// Guards against the upstream answering for the wrong station, which would
/// otherwise poison the cache entry for `station`.
pub fn validate_station(station: &str, body: &[u8]) -> Result<(), UpstreamError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::InvalidJson {
            station: station.to_string(),
            message: e.to_string(),
        })?;

    let got = match object.get("stationName") {
        Some(serde_json::Value::String(name)) if name == station => return Ok(()),
        Some(serde_json::Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    Err(UpstreamError::SchemaMismatch {
        expected: station.to_string(),
        got,
    })
}
