//! HTTP route handlers.

use std::path::Path;

use axum::{
    Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::services::ServeDir;

use crate::upstream::UpstreamError;

use super::state::AppState;

/// Create the application router.
///
/// `static_dir` is served for every path the API does not claim.
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/metadata", get(missing_station))
        .route("/api/metadata/", get(missing_station))
        .route("/api/metadata/:station", get(metadata))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn missing_station() -> AppError {
    AppError::BadRequest {
        message: "Missing 'param' parameter".to_string(),
    }
}

/// Live metadata for one station, served through the cache.
///
/// An `If-None-Match` header equal to the current ETag gets a bodyless 304.
async fn metadata(
    State(state): State<AppState>,
    UrlPath(station): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if station.is_empty() {
        return Err(missing_station().await);
    }

    tracing::info!(station, "metadata requested");
    let cached = state.cache.get(&station).await?;

    let etag = HeaderValue::from_str(&cached.etag).map_err(|e| AppError::Internal {
        message: format!("invalid ETag: {e}"),
    })?;

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|client| client.as_bytes() == etag.as_bytes());

    if not_modified {
        tracing::debug!(station, "client copy is current");
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::ETAG, etag),
        ],
        cached.payload,
    )
        .into_response())
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        tracing::error!(status = status.as_u16(), "{message}");

        (status, message).into_response()
    }
}
