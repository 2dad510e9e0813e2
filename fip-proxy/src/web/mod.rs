//! HTTP boundary for the metadata proxy.
//!
//! Serves cached upstream metadata with strong ETags, answers conditional
//! requests with 304, and falls back to static files for everything else.

mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
