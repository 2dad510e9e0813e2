//! Content-derived validation tokens.

use sha2::{Digest, Sha256};

/// Compute the strong ETag for a payload.
///
/// The token is the lowercase hex SHA-256 of the bytes wrapped in double
/// quotes, e.g. `"e3b0c442..."`. It is never stored: callers derive it from
/// whatever bytes they are about to serve.
pub fn etag(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    format!("\"{}\"", hex::encode(digest))
}
