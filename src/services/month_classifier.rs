//! Calendar month helpers and the month completeness check

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month after `month_start`'s month
pub fn next_month(month_start: NaiveDate) -> NaiveDate {
    let (year, month) = if month_start.month() == 12 {
        (month_start.year() + 1, 1)
    } else {
        (month_start.year(), month_start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

/// Last calendar day of `month_start`'s month
pub fn month_end(month_start: NaiveDate) -> NaiveDate {
    next_month(first_of_month(month_start))
        .pred_opt()
        .unwrap_or(month_start)
}

/// Whether the month's data window has fully elapsed at `now`.
///
/// Upstream reporting lags across time zones, so a month only counts as
/// complete once a full day has passed after its last day.
pub fn is_complete(month_start: NaiveDate, now: NaiveDateTime) -> bool {
    let last_day = month_end(month_start).and_time(chrono::NaiveTime::MIN);
    now > last_day + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ========== month_end() tests ==========

    #[test]
    fn test_month_end_regular_months() {
        assert_eq!(month_end(date(2024, 1, 1)), date(2024, 1, 31));
        assert_eq!(month_end(date(2024, 4, 1)), date(2024, 4, 30));
        assert_eq!(month_end(date(2024, 12, 1)), date(2024, 12, 31));
    }

    #[test]
    fn test_month_end_february() {
        assert_eq!(month_end(date(2024, 2, 1)), date(2024, 2, 29));
        assert_eq!(month_end(date(2023, 2, 1)), date(2023, 2, 28));
    }

    #[test]
    fn test_month_end_mid_month_input() {
        assert_eq!(month_end(date(2024, 6, 17)), date(2024, 6, 30));
    }

    #[test]
    fn test_next_month_wraps_year() {
        assert_eq!(next_month(date(2023, 12, 1)), date(2024, 1, 1));
        assert_eq!(next_month(date(2024, 1, 1)), date(2024, 2, 1));
    }

    #[test]
    fn test_first_of_month() {
        assert_eq!(first_of_month(date(2024, 3, 31)), date(2024, 3, 1));
        assert_eq!(first_of_month(date(2024, 3, 1)), date(2024, 3, 1));
    }

    // ========== is_complete() tests ==========

    #[test]
    fn test_is_complete_one_day_one_second_after_last_day() {
        let now = date(2024, 2, 1).and_hms_opt(0, 0, 1).unwrap();
        assert!(is_complete(date(2024, 1, 1), now));
    }

    #[test]
    fn test_is_complete_exactly_at_last_day() {
        let now = date(2024, 1, 31).and_hms_opt(0, 0, 0).unwrap();
        assert!(!is_complete(date(2024, 1, 1), now));
    }

    #[test]
    fn test_is_complete_exactly_one_day_after_is_not_enough() {
        let now = date(2024, 2, 1).and_hms_opt(0, 0, 0).unwrap();
        assert!(!is_complete(date(2024, 1, 1), now));
    }

    #[test]
    fn test_is_complete_current_month() {
        let now = date(2024, 5, 15).and_hms_opt(12, 0, 0).unwrap();
        assert!(!is_complete(date(2024, 5, 1), now));
    }

    #[test]
    fn test_is_complete_long_past() {
        let now = date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert!(is_complete(date(2023, 2, 1), now));
    }
}
