//! In-memory content caching.
//!
//! This module provides the `ContentStore`, which keeps the last successful
//! response for every request path so it can be served again when the
//! upstream is unreachable or rejects the session token.
//!
//! Nothing is persisted; entries live until the process exits or, when
//! `max_entries` is configured, until they are the oldest entry over the bound.

pub mod manager;

pub use manager::{CachePolicy, CachedData, ContentStore};
