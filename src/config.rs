//! Resolved runtime configuration

use chrono_tz::Tz;
use std::path::PathBuf;

use crate::services::source::DEFAULT_GRAPHQL_URL;
use crate::services::user_cache::DEFAULT_TTL_HOURS;
use crate::types::{Result, WrapError};

/// Schema tag written into every month record. Bump when `UserPackage`
/// changes shape; older records are then refetched.
pub const SCHEMA_VERSION: &str = "2";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// IANA zone that defines upstream day boundaries
pub const DEFAULT_REPORTING_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Month store root. `None` uses `~/.wrapstats`.
    pub store_dir: Option<PathBuf>,
    pub schema_version: String,
    pub graphql_url: String,
    /// IANA zone name; day and month boundaries follow its DST rules
    pub reporting_timezone: String,
    /// Max gap months fetched at once (1 = serialized)
    pub fetch_concurrency: usize,
    pub request_timeout_secs: u64,
    pub cache_ttl_hours: i64,
    /// Sibling instance to notify after a multi-month backfill
    pub bust_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            schema_version: SCHEMA_VERSION.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            reporting_timezone: DEFAULT_REPORTING_TIMEZONE.to_string(),
            fetch_concurrency: 1,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            bust_endpoint: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version.trim().is_empty() {
            return Err(WrapError::Config("schema version must not be empty".into()));
        }
        if self.fetch_concurrency == 0 {
            return Err(WrapError::Config("fetch concurrency must be at least 1".into()));
        }
        if self.cache_ttl_hours <= 0 {
            return Err(WrapError::Config("cache TTL must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(WrapError::Config("request timeout must be positive".into()));
        }
        self.reporting_tz()?;
        Ok(())
    }

    pub fn reporting_tz(&self) -> Result<Tz> {
        self.reporting_timezone.parse::<Tz>().map_err(|e| {
            WrapError::Config(format!(
                "unknown reporting timezone {:?}: {}",
                self.reporting_timezone, e
            ))
        })
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
