//! Month records and requested date ranges

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{Result, UserPackage, WrapError};

/// One persisted month of wrapped statistics.
///
/// Identified by `(user_id, private, month)`. `month` is always the first day
/// of a calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthRecord {
    pub user_id: String,
    pub month: NaiveDate,
    /// Schema tag at write time
    pub version: String,
    pub private: bool,
    /// First-attempt fetch of a fully elapsed month. Only these are reused.
    pub complete: bool,
    pub data: UserPackage,
}

impl MonthRecord {
    pub fn is_current(&self, version: &str) -> bool {
        self.version == version
    }
}

/// Inclusive date range requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(WrapError::Config(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The last 365 days through `today`.
    pub fn trailing_year(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(365),
            end: today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        let err = DateRange::new(date(2024, 5, 1), date(2024, 4, 1)).unwrap_err();
        assert!(matches!(err, WrapError::Config(_)));
    }

    #[test]
    fn test_date_range_single_day() {
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 1)).unwrap();
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_trailing_year() {
        let range = DateRange::trailing_year(date(2024, 12, 31));
        // 2024 is a leap year
        assert_eq!(range.start, date(2024, 1, 1));
        assert_eq!(range.end, date(2024, 12, 31));
    }

    #[test]
    fn test_record_is_current() {
        let record = MonthRecord {
            user_id: "octocat".into(),
            month: date(2024, 1, 1),
            version: "v3".into(),
            private: false,
            complete: true,
            data: UserPackage::empty(),
        };
        assert!(record.is_current("v3"));
        assert!(!record.is_current("v2"));
    }
}
