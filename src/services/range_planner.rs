//! Month gap planning for a requested date range

use chrono::NaiveDate;
use std::collections::HashSet;

use super::month_classifier::{first_of_month, next_month};

/// Every first-of-month from `start`'s month through `end`'s month inclusive
pub fn months_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let last = first_of_month(end);
    let mut current = first_of_month(start);

    while current <= last {
        months.push(current);
        let next = next_month(current);
        if next <= current {
            break;
        }
        current = next;
    }

    months
}

/// Months in range lacking a complete cached record, in chronological order.
///
/// Granularity is always the whole calendar month: a range that only touches
/// a few days of a month still plans that month.
pub fn plan_gaps(
    start: NaiveDate,
    end: NaiveDate,
    cached_complete: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    months_in_range(start, end)
        .into_iter()
        .filter(|month| !cached_complete.contains(month))
        .collect()
}
