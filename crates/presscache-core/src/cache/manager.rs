use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::ContentItem;

/// Bound on the number of cached items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// `None` keeps every item for the life of the process.
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Ticket of the fetch that produced this value.
    pub sequence: u64,
}

impl<T> CachedData<T> {
    pub fn new(data: T, sequence: u64) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            sequence,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Last-known-good content per request path, kept in memory.
pub struct ContentStore {
    entries: DashMap<String, CachedData<ContentItem>>,
    policy: CachePolicy,
    sequence: AtomicU64,
}

impl ContentStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            sequence: AtomicU64::new(0),
        }
    }

    /// Take a ticket before issuing a fetch. Tickets are strictly increasing,
    /// so a later-issued fetch always wins over an earlier one.
    pub fn ticket(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store `item` under `key` unless a fetch issued later already wrote it.
    /// Returns whether the item was stored.
    pub fn put(&self, key: &str, item: ContentItem, ticket: u64) -> bool {
        let inserted_new_key = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().sequence > ticket {
                    debug!(key, ticket, newer = occupied.get().sequence, "Skipping out-of-order cache write");
                    return false;
                }
                occupied.insert(CachedData::new(item, ticket));
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedData::new(item, ticket));
                true
            }
        };

        if inserted_new_key {
            self.enforce_bound(key);
        }
        true
    }

    pub fn get(&self, key: &str) -> Option<CachedData<ContentItem>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Evict the oldest entries (other than `keep`) until the bound holds.
    fn enforce_bound(&self, keep: &str) {
        let Some(max) = self.policy.max_entries else {
            return;
        };

        while self.entries.len() > max {
            let oldest = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| (entry.value().cached_at, entry.value().sequence))
                .map(|entry| entry.key().clone());

            match oldest {
                Some(victim) => {
                    self.entries.remove(&victim);
                    debug!(key = %victim, max, "Evicted cache entry");
                }
                None => break,
            }
        }
    }
}
