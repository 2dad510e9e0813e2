//! Read-through cache for upstream metadata.
//!
//! Each station gets its own slot: an async mutex around the latest entry.
//! A lookup holds the slot lock across the whole check-fetch-store sequence,
//! so concurrent lookups for one station share a single upstream call while
//! lookups for other stations proceed in parallel.
//!
//! Expiry is lazy. A stale entry stays in its slot until the next successful
//! fetch replaces it; a failed refresh leaves it where it is but never serves
//! it. The number of slots is bounded by moka's size-based eviction.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::etag::etag;
use crate::upstream::{Fetcher, UpstreamError};

/// Latest entry for one station, if any fetch has succeeded yet.
type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served before it is refetched.
    pub ttl: Duration,

    /// Maximum number of stations tracked at once.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(1),
            max_capacity: 1000,
        }
    }
}

/// A successfully fetched payload and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub fetched_at: Instant,
}

impl CacheEntry {
    fn new(payload: Bytes) -> Self {
        Self {
            payload,
            fetched_at: Instant::now(),
        }
    }

    /// Time since the entry was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    fn to_cached(&self) -> CachedPayload {
        CachedPayload {
            etag: etag(&self.payload),
            payload: self.payload.clone(),
        }
    }
}

/// What a lookup hands back: the payload and its validation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: Bytes,
    pub etag: String,
}

/// Read-through cache in front of a [`Fetcher`].
pub struct MetadataCache {
    fetcher: Arc<dyn Fetcher>,
    slots: MokaCache<String, Slot>,
    ttl: Duration,
}

impl MetadataCache {
    /// Create a new cache with the given fetcher and configuration.
    ///
    /// At most `max_capacity` stations keep a slot. A slot evicted while its
    /// fetch is still running is forgotten, so a later lookup for that
    /// station can start a second fetch alongside the first.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CacheConfig) -> Self {
        let slots = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self {
            fetcher,
            slots,
            ttl: config.ttl,
        }
    }

    /// Get the metadata for `station`, fetching it if missing or stale.
    ///
    /// Fetch errors are returned as-is. Nothing is stored on failure and a
    /// stale entry is never returned in place of an error.
    pub async fn get(&self, station: &str) -> Result<CachedPayload, UpstreamError> {
        let slot = self.slot(station).await;
        let mut entry = slot.lock().await;

        match entry.as_ref() {
            Some(cached) if cached.is_fresh(self.ttl) => {
                tracing::debug!(station, "cache hit");
                return Ok(cached.to_cached());
            }
            Some(cached) => {
                let age_ms = u64::try_from(cached.age().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(station, age_ms, "cache expired");
            }
            None => tracing::debug!(station, "cache miss"),
        }

        let payload = self.fetcher.fetch(station).await.inspect_err(|e| {
            tracing::warn!(station, error = %e, "upstream fetch failed");
        })?;

        let fresh = CacheEntry::new(payload);
        let cached = fresh.to_cached();
        *entry = Some(fresh);
        tracing::debug!(station, bytes = cached.payload.len(), "cached new data");

        Ok(cached)
    }

    /// Look at the stored entry for `station` without fetching.
    ///
    /// Waits for any in-flight fetch for the same station to finish.
    pub async fn peek(&self, station: &str) -> Option<CacheEntry> {
        let slot = self.slots.get(station).await?;
        let entry = slot.lock().await;
        entry.clone()
    }

    /// Number of stations currently tracked.
    pub async fn station_count(&self) -> u64 {
        self.slots.run_pending_tasks().await;
        self.slots.entry_count()
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.slots.invalidate_all();
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Slot for `station`, created on first use.
    ///
    /// moka runs the init future once per key, so concurrent first lookups
    /// all receive the same slot.
    async fn slot(&self, station: &str) -> Slot {
        self.slots
            .get_with_by_ref(station, async { Arc::new(Mutex::new(None)) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockFetcher;

    const FIP: &str = r#"{"stationName":"fip","levels":[],"slots":[]}"#;

    fn config(ttl_ms: u64) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(ttl_ms),
            ..CacheConfig::default()
        }
    }

    fn cache_with(mock: &Arc<MockFetcher>, config: &CacheConfig) -> MetadataCache {
        MetadataCache::new(mock.clone(), config)
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(1));
        assert_eq!(config.max_capacity, 1000);
    }

    #[tokio::test]
    async fn cache_creation() {
        let cache = MetadataCache::new(Arc::new(MockFetcher::new()), &CacheConfig::default());
        assert_eq!(cache.station_count().await, 0);
        assert_eq!(cache.ttl(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn returns_exact_bytes_and_sha256_etag() {
        let mock = Arc::new(MockFetcher::new().with_payload("fip", FIP));
        let cache = cache_with(&mock, &CacheConfig::default());

        let got = cache.get("fip").await.unwrap();

        assert_eq!(&got.payload[..], FIP.as_bytes());
        assert_eq!(got.etag, etag(FIP.as_bytes()));
        assert_eq!(
            got.etag,
            format!(
                "\"{}\"",
                hex::encode(<sha2::Sha256 as sha2::Digest>::digest(FIP.as_bytes()))
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_skips_upstream() {
        let mock = Arc::new(MockFetcher::new().with_payload("fip", FIP));
        let cache = cache_with(&mock, &config(1000));

        let first = cache.get("fip").await.unwrap();
        tokio::time::advance(Duration::from_millis(999)).await;
        let second = cache.get("fip").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_triggers_one_refetch() {
        let mock = Arc::new(MockFetcher::new().with_payload("fip", FIP));
        let cache = cache_with(&mock, &config(1000));

        let first = cache.get("fip").await.unwrap();

        let updated = r#"{"stationName":"fip","levels":[1],"slots":[]}"#;
        mock.set_payload("fip", updated);
        tokio::time::advance(Duration::from_millis(1000)).await;

        let second = cache.get("fip").await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(&second.payload[..], updated.as_bytes());
        assert_ne!(first.etag, second.etag);

        // Fresh again: no third call.
        cache.get("fip").await.unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_prior_entry() {
        let mock = Arc::new(MockFetcher::new().with_payload("fip", FIP));
        let cache = cache_with(&mock, &config(1000));

        cache.get("fip").await.unwrap();
        let before = cache.peek("fip").await.unwrap();

        mock.set_status("fip", 500);
        tokio::time::advance(Duration::from_secs(2)).await;

        let err = cache.get("fip").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { code: 500, .. }));

        // The stale entry is still resident, untouched.
        let after = cache.peek("fip").await.unwrap();
        assert_eq!(after.payload, before.payload);
        assert_eq!(after.fetched_at, before.fetched_at);

        // And it is not served: every lookup retries upstream.
        assert!(cache.get("fip").await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn unknown_station_stores_nothing() {
        let mock = Arc::new(MockFetcher::new());
        let cache = cache_with(&mock, &CacheConfig::default());

        let err = cache.get("unknown").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { code: 404, .. }));
        assert!(cache.peek("unknown").await.is_none());

        // No negative caching either.
        assert!(cache.get("unknown").await.is_err());
        assert_eq!(mock.calls_for("unknown"), 2);
    }

    #[tokio::test]
    async fn misrouted_payload_is_schema_mismatch() {
        let mock = Arc::new(
            MockFetcher::new()
                .with_payload("fip", r#"{"stationName":"other","levels":[],"slots":[]}"#)
                .with_validation(true),
        );
        let cache = cache_with(&mock, &CacheConfig::default());

        match cache.get("fip").await {
            Err(UpstreamError::SchemaMismatch { expected, got }) => {
                assert_eq!(expected, "fip");
                assert_eq!(got, "other");
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        assert!(cache.peek("fip").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_station_fetches_once() {
        let mock = Arc::new(
            MockFetcher::new()
                .with_payload("fip", FIP)
                .with_delay(Duration::from_millis(50)),
        );
        let cache = Arc::new(cache_with(&mock, &CacheConfig::default()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("fip").await })
            })
            .collect();

        let results: Vec<CachedPayload> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(mock.call_count(), 1);
        assert!(results.iter().all(|r| r == &results[0]));
        assert_eq!(&results[0].payload[..], FIP.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_stations_fetch_in_parallel() {
        let mock = Arc::new(
            MockFetcher::new()
                .with_payload("fip", FIP)
                .with_payload("fip_rock", r#"{"stationName":"fip_rock"}"#)
                .with_delay(Duration::from_millis(200)),
        );
        let cache = cache_with(&mock, &config(60_000));

        let start = Instant::now();
        let (a, b) = tokio::join!(cache.get("fip"), cache.get("fip_rock"));
        let elapsed = start.elapsed();

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(mock.calls_for("fip"), 1);
        assert_eq!(mock.calls_for("fip_rock"), 1);
        // Serialized fetches would take 400ms.
        assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn invalidate_all_forces_refetch() {
        let mock = Arc::new(MockFetcher::new().with_payload("fip", FIP));
        let cache = cache_with(&mock, &config(60_000));

        cache.get("fip").await.unwrap();
        assert_eq!(cache.station_count().await, 1);

        cache.invalidate_all();
        assert!(cache.peek("fip").await.is_none());

        cache.get("fip").await.unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn station_count_stays_within_capacity() {
        let mock = Arc::new(MockFetcher::new());
        for i in 0..20 {
            mock.set_payload(&format!("station_{i}"), FIP);
        }
        let config = CacheConfig {
            max_capacity: 4,
            ..config(60_000)
        };
        let cache = cache_with(&mock, &config);

        for i in 0..20 {
            cache.get(&format!("station_{i}")).await.unwrap();
        }

        assert_eq!(mock.call_count(), 20);
        assert!(cache.station_count().await <= 4);
    }
}
