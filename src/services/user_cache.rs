//! Short-term memoization of per-user aggregates
//!
//! Entries expire after a fixed TTL measured with an injected clock, so tests
//! can drive expiry without sleeping.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::clock::Clock;
use crate::types::{DateRange, UserPackage};

/// Default memoization TTL (6 hours)
pub const DEFAULT_TTL_HOURS: i64 = 6;

/// Every input that changes what a query returns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub has_access_token: bool,
    pub private: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(
        user_id: &str,
        access_token: Option<&str>,
        private: bool,
        range: DateRange,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            has_access_token: access_token.is_some(),
            private,
            start: range.start,
            end: range.end,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedAggregate {
    value: Option<UserPackage>,
    inserted_at: DateTime<Utc>,
}

/// Process-wide TTL cache of query results
pub struct UserAggregateCache {
    entries: Mutex<HashMap<CacheKey, CachedAggregate>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl UserAggregateCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    fn is_expired(&self, entry: &CachedAggregate, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at > self.ttl
    }

    /// Live entry for `key`. The outer `Option` is hit/miss; the inner one is
    /// the memoized aggregate, which may itself be absent.
    pub fn get(&self, key: &CacheKey) -> Option<Option<UserPackage>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert `value`, dropping any expired entries first so the map only
    /// ever holds live keys plus those untouched since the last insert.
    pub fn put(&self, key: CacheKey, value: Option<UserPackage>) {
        let inserted_at = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let purged = self.retain_live(&mut entries, inserted_at);
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired aggregates");
        }
        entries.insert(key, CachedAggregate { value, inserted_at });
    }

    fn retain_live(
        &self,
        entries: &mut HashMap<CacheKey, CachedAggregate>,
        now: DateTime<Utc>,
    ) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Drop every entry for a user. Returns how many were removed.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| key.user_id != user_id);
        before - entries.len()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.retain_live(&mut entries, now)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
