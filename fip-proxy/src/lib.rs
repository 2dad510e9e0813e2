//! Caching proxy for FIP live metadata.
//!
//! Clients ask for a webradio by name; the proxy fetches the live metadata
//! JSON from the upstream API at most once per TTL window per station and
//! serves it with a content-derived ETag.

pub mod cache;
pub mod config;
pub mod etag;
pub mod upstream;
pub mod web;
