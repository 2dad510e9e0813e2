//! Mock upstream for testing and offline development.
//!
//! Serves canned payloads from memory, or from a directory of
//! `{station}.json` files, as if they were live API responses.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use super::Fetcher;
use super::error::UpstreamError;
use super::validate_station;

/// What the mock answers for a station.
#[derive(Debug, Clone)]
enum Canned {
    Payload(Bytes),
    Status(u16),
}

/// Mock fetcher that serves canned responses and counts calls.
///
/// Stations with no canned response answer with a 404 status error, like
/// the real upstream does for unknown webradios.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    delay: Option<Duration>,
    validate_station: bool,
}

impl MockFetcher {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `{station}.json` file in `data_dir`.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> io::Result<Self> {
        let data_dir = data_dir.as_ref();
        let mock = Self::new();

        for entry in std::fs::read_dir(data_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let Some(station) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let payload = std::fs::read(&path)?;
            mock.set_payload(station, payload);
        }

        if mock.stations().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock metadata files found in {}", data_dir.display()),
            ));
        }

        Ok(mock)
    }

    /// Add a canned payload (builder form of [`set_payload`](Self::set_payload)).
    pub fn with_payload(self, station: &str, payload: impl Into<Bytes>) -> Self {
        self.set_payload(station, payload);
        self
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Apply the same `stationName` validation as the HTTP fetcher.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_station = enabled;
        self
    }

    /// Replace the payload served for `station`.
    pub fn set_payload(&self, station: &str, payload: impl Into<Bytes>) {
        self.lock_responses()
            .insert(station.to_string(), Canned::Payload(payload.into()));
    }

    /// Make `station` answer with a non-200 status.
    pub fn set_status(&self, station: &str, code: u16) {
        self.lock_responses()
            .insert(station.to_string(), Canned::Status(code));
    }

    /// Stations with a canned response, sorted.
    pub fn stations(&self) -> Vec<String> {
        let mut stations: Vec<String> = self.lock_responses().keys().cloned().collect();
        stations.sort();
        stations
    }

    /// Total number of fetches across all stations.
    pub fn call_count(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Number of fetches for one station.
    pub fn calls_for(&self, station: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(station)
            .copied()
            .unwrap_or(0)
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<String, Canned>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, station: &str) -> Result<Bytes, UpstreamError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(station.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // Clone out so the lock is not held across validation.
        let canned = self.lock_responses().get(station).cloned();

        match canned {
            Some(Canned::Payload(payload)) => {
                if self.validate_station {
                    validate_station(station, &payload)?;
                }
                Ok(payload)
            }
            Some(Canned::Status(code)) => Err(UpstreamError::Status {
                station: station.to_string(),
                code,
            }),
            None => Err(UpstreamError::Status {
                station: station.to_string(),
                code: 404,
            }),
        }
    }
}
