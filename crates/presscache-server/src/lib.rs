//! HTTP front-end for presscache.
//!
//! Serves `GET /{type}/{id}` as an HTML page built from the upstream content
//! item, using the core `FetchCache` for session handling and stale-serve.

pub mod render;
pub mod routes;
pub mod startup;

pub use routes::{router, AppState};
pub use startup::{build_cache, open_session};
