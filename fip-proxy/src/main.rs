use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use fip_proxy::cache::MetadataCache;
use fip_proxy::config::ProxyConfig;
use fip_proxy::upstream::{Fetcher, HttpFetcher, MockFetcher};
use fip_proxy::web::{AppState, create_router};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "fip_proxy=info,tower_http=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = ProxyConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("{e}");
        std::process::exit(1);
    });

    let fetcher: Arc<dyn Fetcher> = match &config.mock_data_dir {
        Some(dir) => {
            let mock = MockFetcher::from_dir(dir).expect("Failed to load mock metadata");
            tracing::warn!(
                dir = %dir.display(),
                stations = ?mock.stations(),
                "serving mock metadata instead of the upstream API"
            );
            Arc::new(mock.with_validation(config.validate_station))
        }
        None => Arc::new(
            HttpFetcher::new(config.upstream()).expect("Failed to create upstream client"),
        ),
    };

    let cache = MetadataCache::new(fetcher, &config.cache());
    let app = create_router(AppState::new(cache), &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        upstream = %config.base_url,
        ttl_secs = config.cache_ttl.as_secs(),
        "server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    axum::serve(listener, app).await.expect("Server error");
}
