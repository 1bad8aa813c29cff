//! Per-request query flow: plan gaps, fill them, merge, decide cacheability

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::aggregator::Aggregator;
use super::cache_bust::CacheBuster;
use super::clock::Clock;
use super::month_fetcher::MonthFetcher;
use super::range_planner::plan_gaps;
use super::source::DataSource;
use super::store::MonthStore;
use crate::config::Config;
use crate::types::{DateRange, MonthRecord, Result, UserPackage, WrapError};

/// Result of one aggregate query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Safe to memoize. False once more than one month had to be fetched.
    pub cacheable: bool,
    pub aggregate: Option<UserPackage>,
    /// Gap months planned for this request
    pub gap_months: Vec<NaiveDate>,
    /// Gap months that actually produced fresh data
    pub fetched_months: Vec<NaiveDate>,
    /// Every month that contributed to `aggregate`, in merge order
    pub merged_months: Vec<NaiveDate>,
}

pub struct QueryOrchestrator {
    store: Arc<dyn MonthStore>,
    fetcher: MonthFetcher,
    buster: Arc<dyn CacheBuster>,
    pool: rayon::ThreadPool,
    schema_version: String,
}

impl QueryOrchestrator {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn MonthStore>,
        clock: Arc<dyn Clock>,
        buster: Arc<dyn CacheBuster>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.fetch_concurrency)
            .thread_name(|i| format!("wrapstats-fetch-{}", i))
            .build()
            .map_err(|e| WrapError::Config(format!("fetch pool: {}", e)))?;
        let fetcher = MonthFetcher::new(
            source,
            store.clone(),
            clock,
            config.reporting_tz()?,
            config.schema_version.clone(),
        );

        Ok(Self {
            store,
            fetcher,
            buster,
            pool,
            schema_version: config.schema_version.clone(),
        })
    }

    /// Aggregate a user's statistics over `range`, fetching only what the
    /// store cannot already answer.
    ///
    /// Month-level fetch failures only shrink the aggregate. A failed save
    /// aborts the whole request.
    pub fn query_user_aggregate(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        private: bool,
        range: DateRange,
    ) -> Result<QueryOutcome> {
        if let Err(e) = self.store.refresh_access_keys() {
            tracing::warn!(error = %e, "Access key refresh failed, keeping current keys");
        }

        let records = self
            .store
            .load_range(user_id, private, range.start, range.end)?;
        let (complete, mut incomplete) = self.split_current(user_id, records);

        let cached: HashSet<NaiveDate> = complete.keys().copied().collect();
        let gap_months = plan_gaps(range.start, range.end, &cached);
        tracing::debug!(
            user = user_id,
            cached = cached.len(),
            gaps = gap_months.len(),
            "Planned query"
        );

        let fetched = self.fill_gaps(user_id, access_token, private, &gap_months)?;

        // Cached and fresh months share one chronological merge order
        let mut by_month: BTreeMap<NaiveDate, UserPackage> = complete;
        let mut fetched_months = Vec::new();
        for (month, data) in gap_months.iter().copied().zip(fetched) {
            match data {
                Some(data) => {
                    fetched_months.push(month);
                    by_month.insert(month, data);
                }
                None => {
                    if let Some(stale) = incomplete.remove(&month) {
                        tracing::debug!(
                            user = user_id,
                            %month,
                            "Falling back to incomplete record"
                        );
                        by_month.insert(month, stale.data);
                    }
                }
            }
        }
        let merged_months: Vec<NaiveDate> = by_month.keys().copied().collect();
        let payloads: Vec<UserPackage> = by_month.into_values().collect();
        let aggregate = Aggregator::merge(&payloads);

        let cacheable = gap_months.len() <= 1;
        if !cacheable {
            self.buster.bust(user_id);
        }

        tracing::info!(
            user = user_id,
            private,
            gaps = gap_months.len(),
            fetched = fetched_months.len(),
            cacheable,
            "Query complete"
        );

        Ok(QueryOutcome {
            cacheable,
            aggregate,
            gap_months,
            fetched_months,
            merged_months,
        })
    }

    /// Drop stale-schema records, then index the rest by month and completeness
    fn split_current(
        &self,
        user_id: &str,
        records: Vec<MonthRecord>,
    ) -> (
        BTreeMap<NaiveDate, UserPackage>,
        BTreeMap<NaiveDate, MonthRecord>,
    ) {
        let mut complete = BTreeMap::new();
        let mut incomplete = BTreeMap::new();
        for record in records {
            if !record.is_current(&self.schema_version) {
                tracing::debug!(
                    user = user_id,
                    month = %record.month,
                    version = %record.version,
                    "Ignoring record with stale schema"
                );
                continue;
            }
            if record.complete {
                complete.insert(record.month, record.data);
            } else {
                incomplete.insert(record.month, record);
            }
        }
        (complete, incomplete)
    }

    /// One result per gap month, in the same order as `gaps`
    fn fill_gaps(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        private: bool,
        gaps: &[NaiveDate],
    ) -> Result<Vec<Option<UserPackage>>> {
        if gaps.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<Result<Option<UserPackage>>> = self.pool.install(|| {
            gaps.par_iter()
                .map(|&month| {
                    self.fetcher
                        .fetch_month(user_id, access_token, private, month)
                })
                .collect()
        });

        results.into_iter().collect()
    }
}
