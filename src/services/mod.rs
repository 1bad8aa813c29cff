//! Services for fetching, persisting and merging month records

pub mod access_keys;
pub mod aggregator;
pub mod cache_bust;
pub mod clock;
pub mod month_classifier;
pub mod month_fetcher;
pub mod orchestrator;
pub mod range_planner;
pub mod source;
pub mod store;
pub mod user_cache;
pub mod wrapped;

#[cfg(test)]
pub(crate) mod testing;

pub use access_keys::AccessKeyRing;
pub use aggregator::Aggregator;
pub use cache_bust::{CacheBuster, HttpCacheBuster, NoopCacheBuster};
pub use clock::{Clock, ManualClock, SystemClock};
pub use month_fetcher::MonthFetcher;
pub use orchestrator::{QueryOrchestrator, QueryOutcome};
pub use source::{DataSource, GraphQlSource, SourceError};
pub use store::{FileMonthStore, MonthStore};
pub use user_cache::{CacheKey, UserAggregateCache};
pub use wrapped::WrappedService;
