//! Single-month fetch with one retry and persistence of the result

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;

use super::clock::Clock;
use super::month_classifier::{first_of_month, is_complete, month_end};
use super::source::{DataSource, SourceError};
use super::store::MonthStore;
use crate::types::{MonthRecord, Result, UserPackage};

/// Fetches exactly one calendar month and persists what it got
pub struct MonthFetcher {
    source: Arc<dyn DataSource>,
    store: Arc<dyn MonthStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    schema_version: String,
}

impl MonthFetcher {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn MonthStore>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            tz,
            schema_version: schema_version.into(),
        }
    }

    /// Fetch and persist one month.
    ///
    /// `Ok(None)` means nothing usable came back (rate limited, or failed twice)
    /// and nothing was written. A retried result is returned and saved, but
    /// never marked complete. Only a failed save is an error.
    pub fn fetch_month(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        private: bool,
        month_start: NaiveDate,
    ) -> Result<Option<UserPackage>> {
        let month = first_of_month(month_start);
        let end = month_end(month);

        let (data, first_attempt) =
            match self
                .source
                .fetch(user_id, access_token, month, end, self.tz, false)
            {
                Ok(data) => (data, true),
                Err(SourceError::RateLimited) => {
                    tracing::info!(user = user_id, %month, "Rate limited, skipping month");
                    return Ok(None);
                }
                Err(SourceError::Other(e)) => {
                    tracing::warn!(
                        user = user_id,
                        %month,
                        error = %e,
                        "Fetch failed, retrying once"
                    );
                    match self
                        .source
                        .fetch(user_id, access_token, month, end, self.tz, true)
                    {
                        Ok(data) => (data, false),
                        Err(e) => {
                            tracing::warn!(
                                user = user_id,
                                %month,
                                error = %e,
                                "Retry failed, giving up on month"
                            );
                            return Ok(None);
                        }
                    }
                }
            };

        let now = self.clock.now().with_timezone(&self.tz).naive_local();
        let record = MonthRecord {
            user_id: user_id.to_string(),
            month,
            version: self.schema_version.clone(),
            private,
            complete: first_attempt && is_complete(month, now),
            data,
        };

        self.store.save(&record)?;
        tracing::debug!(
            user = user_id,
            %month,
            complete = record.complete,
            retried = !first_attempt,
            "Fetched month"
        );

        Ok(Some(record.data))
    }
}
