//! Content reads with stale-serve fallback.
//!
//! `FetchCache::get` forwards a read to the remote API with the shared session
//! token. Successful responses are remembered per request path; when a later
//! read of the same path fails, the remembered response is served instead.
//! Failures that reject the token itself also invalidate the session and start
//! a background reopen, without delaying the current response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, RemoteClient};
use crate::auth::SessionManager;
use crate::cache::{CachePolicy, ContentStore};
use crate::models::{ContentItem, ContentPath, InvalidPath};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("No open session")]
    NoSessionAvailable,

    #[error("Invalid request")]
    InvalidRequest(#[from] InvalidPath),

    #[error("Failed to load content for {key}")]
    ContentFetchFailed {
        key: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Served from cache after the live fetch failed.
    Stale { age: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub item: ContentItem,
    pub freshness: Freshness,
}

impl Fetched {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }
}

/// Counters for how reads were answered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub fresh: u64,
    pub stale: u64,
    pub failed: u64,
    /// Reads refused because no session was open.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    fresh: AtomicU64,
    stale: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

pub struct FetchCache {
    session: SessionManager,
    client: Arc<dyn RemoteClient>,
    store: ContentStore,
    counters: Counters,
}

impl FetchCache {
    pub fn new(session: SessionManager, client: Arc<dyn RemoteClient>, policy: CachePolicy) -> Self {
        Self {
            session,
            client,
            store: ContentStore::new(policy),
            counters: Counters::default(),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            fresh: self.counters.fresh.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Fetch `{kind}/{id}`, falling back to the last good copy on failure.
    pub async fn get(&self, kind: &str, id: &str) -> Result<Fetched, FetchError> {
        let bearer = match self.session.ensure_open() {
            Ok(bearer) => bearer,
            Err(_) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                if self.session.trigger_reopen_if_invalid().is_some() {
                    info!("No open session, reopen triggered");
                }
                return Err(FetchError::NoSessionAvailable);
            }
        };

        let path = ContentPath::new(kind, id)?;
        let key = path.key();
        let ticket = self.store.ticket();

        let err = match self.client.fetch_content(bearer.as_str(), &path).await {
            Ok(item) => {
                self.store.put(&key, item.clone(), ticket);
                self.counters.fresh.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Fetched content");
                return Ok(Fetched {
                    item,
                    freshness: Freshness::Fresh,
                });
            }
            Err(err) => err,
        };

        if err.is_auth_rejection() {
            warn!(key = %key, error = %err, "Remote rejected session token");
            self.session.report_unauthorized(bearer.generation());
        }

        match self.store.get(&key) {
            Some(cached) => {
                let age = cached.age_display();
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %err, age = %age, "Serving stale content");
                Ok(Fetched {
                    item: cached.data,
                    freshness: Freshness::Stale { age },
                })
            }
            None => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %err, "Failed to load content");
                Err(FetchError::ContentFetchFailed { key, source: err })
            }
        }
    }
}
