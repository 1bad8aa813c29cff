//! Memoized front door over [`QueryOrchestrator`]

use std::sync::Arc;

use super::clock::Clock;
use super::orchestrator::{QueryOrchestrator, QueryOutcome};
use super::user_cache::{CacheKey, UserAggregateCache};
use crate::types::{DateRange, Result, UserPackage};

pub struct WrappedService {
    orchestrator: QueryOrchestrator,
    cache: UserAggregateCache,
}

impl WrappedService {
    pub fn new(orchestrator: QueryOrchestrator, cache: UserAggregateCache) -> Self {
        Self {
            orchestrator,
            cache,
        }
    }

    pub fn with_clock(
        orchestrator: QueryOrchestrator,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self::new(orchestrator, UserAggregateCache::with_ttl(clock, ttl))
    }

    /// Aggregate for `user_id` over `range`.
    ///
    /// A live memoized result is returned without touching the store. With
    /// `no_cache`, every memoized entry for the user is dropped first; this is
    /// what a sibling's cache-bust request maps to in a long-lived service.
    pub fn query(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        private: bool,
        range: DateRange,
        no_cache: bool,
    ) -> Result<Option<UserPackage>> {
        let key = CacheKey::new(user_id, access_token, private, range);

        if no_cache {
            let dropped = self.cache.invalidate_user(user_id);
            tracing::debug!(user = user_id, dropped, "Bypassing memoized aggregates");
        } else if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(user = user_id, "Memoized aggregate hit");
            return Ok(hit);
        }

        let QueryOutcome {
            cacheable,
            aggregate,
            ..
        } = self
            .orchestrator
            .query_user_aggregate(user_id, access_token, private, range)?;

        if cacheable {
            self.cache.put(key, aggregate.clone());
        }
        Ok(aggregate)
    }

    /// Forget memoized aggregates for a user
    pub fn bust(&self, user_id: &str) -> usize {
        self.cache.invalidate_user(user_id)
    }
}
