//! Core library for presscache.
//!
//! Provides the session lifecycle for a token-authenticated content API, the
//! reqwest client for that API, and the stale-serving content cache that sits
//! in front of it.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, HttpClient, RemoteClient};
pub use auth::{Credential, SessionError, SessionManager, SessionOptions};
pub use cache::CachePolicy;
pub use config::Config;
pub use fetch::{FetchCache, FetchError, FetchStats, Fetched, Freshness};
pub use models::{ContentItem, ContentPath};
