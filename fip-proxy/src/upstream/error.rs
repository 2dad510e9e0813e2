//! Upstream fetch error types.

/// Errors from a single upstream metadata fetch.
///
/// None of these are retried inside the proxy; the cache hands them back to
/// its caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request could not be completed (connect failure, timeout, ...)
    #[error("error fetching data for {station}: {source}")]
    Unreachable {
        station: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with something other than 200
    #[error("received non-200 response code for {station}: {code}")]
    Status { station: String, code: u16 },

    /// The response body could not be read to the end
    #[error("error reading response body for {station}: {source}")]
    Body {
        station: String,
        #[source]
        source: reqwest::Error,
    },

    /// The payload is not a JSON object
    #[error("error unmarshalling JSON response for {station}: {message}")]
    InvalidJson { station: String, message: String },

    /// The payload describes a different station than the one requested
    #[error("stationName mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: String, got: String },
}
