//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::MetadataCache;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Read-through metadata cache
    pub cache: Arc<MetadataCache>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(cache: MetadataCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }
}
