//! Wrapped statistics payload and its associative combine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Associative combine with an explicit identity element.
///
/// `a.combine(&b)` followed by `.combine(&c)` must equal combining `a` with the
/// result of `b.combine(&c)`, and the final value must not depend on the order
/// the operands were folded in.
pub trait Combine {
    /// The empty aggregate. Combining with it is a no-op.
    fn identity() -> Self;

    /// Fold `other` into `self`.
    fn combine(&mut self, other: &Self);
}

/// Per-day contribution counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CalendarDay {
    pub contribs: u64,
    #[serde(default)]
    pub repos_created: u64,
}

impl CalendarDay {
    fn add(&mut self, other: &CalendarDay) {
        self.contribs = self.contribs.saturating_add(other.contribs);
        self.repos_created = self.repos_created.saturating_add(other.repos_created);
    }
}

/// Per-repository contribution totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepoTotals {
    pub contribs: u64,
    pub commits: u64,
    pub issues: u64,
    pub prs: u64,
    pub reviews: u64,
    #[serde(default)]
    pub private: bool,
}

impl RepoTotals {
    fn add(&mut self, other: &RepoTotals) {
        self.contribs = self.contribs.saturating_add(other.contribs);
        self.commits = self.commits.saturating_add(other.commits);
        self.issues = self.issues.saturating_add(other.issues);
        self.prs = self.prs.saturating_add(other.prs);
        self.reviews = self.reviews.saturating_add(other.reviews);
        self.private |= other.private;
    }
}

/// Per-language contribution totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LanguageTotals {
    pub contribs: u64,
    #[serde(default)]
    pub color: Option<String>,
}

impl LanguageTotals {
    fn add(&mut self, other: &LanguageTotals) {
        self.contribs = self.contribs.saturating_add(other.contribs);
        // Smallest non-empty color wins so the result is order-independent
        self.color = match (self.color.take(), other.color.as_ref()) {
            (Some(a), Some(b)) => Some(if *b < a { b.clone() } else { a }),
            (Some(a), None) => Some(a),
            (None, b) => b.cloned(),
        };
    }
}

/// Wrapped statistics for one month, or the merge of many months
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserPackage {
    #[serde(default)]
    pub calendar: BTreeMap<NaiveDate, CalendarDay>,
    #[serde(default)]
    pub repos: BTreeMap<String, RepoTotals>,
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageTotals>,
}

impl UserPackage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calendar.is_empty() && self.repos.is_empty() && self.languages.is_empty()
    }

    pub fn record_day(&mut self, date: NaiveDate, day: &CalendarDay) {
        self.calendar.entry(date).or_default().add(day);
    }

    pub fn record_repo(&mut self, name: &str, totals: &RepoTotals) {
        self.repos.entry(name.to_string()).or_default().add(totals);
    }

    pub fn record_language(&mut self, name: &str, totals: &LanguageTotals) {
        self.languages
            .entry(name.to_string())
            .or_default()
            .add(totals);
    }

    /// Derive summary numbers from the calendar and repository totals.
    ///
    /// Computed on demand rather than stored: best day and streaks are not
    /// additive, so storing them would break the combine contract.
    pub fn numeric(&self) -> NumericSummary {
        let mut summary = NumericSummary::default();
        let mut streak: u32 = 0;
        let mut prev_active: Option<NaiveDate> = None;

        for repo in self.repos.values() {
            summary.total_commits = summary.total_commits.saturating_add(repo.commits);
            summary.total_issues = summary.total_issues.saturating_add(repo.issues);
            summary.total_prs = summary.total_prs.saturating_add(repo.prs);
            summary.total_reviews = summary.total_reviews.saturating_add(repo.reviews);
        }

        for (date, day) in &self.calendar {
            summary.total_contribs = summary.total_contribs.saturating_add(day.contribs);
            summary.total_repos_created = summary
                .total_repos_created
                .saturating_add(day.repos_created);

            if day.contribs == 0 {
                continue;
            }

            summary.active_days += 1;

            match &summary.best_day {
                Some((_, best)) if day.contribs <= *best => {}
                _ => summary.best_day = Some((*date, day.contribs)),
            }

            streak = match prev_active {
                Some(prev) if prev.succ_opt() == Some(*date) => streak + 1,
                _ => 1,
            };
            summary.longest_streak = summary.longest_streak.max(streak);
            prev_active = Some(*date);
        }

        summary
    }
}

impl Combine for UserPackage {
    fn identity() -> Self {
        Self::empty()
    }

    fn combine(&mut self, other: &Self) {
        for (date, day) in &other.calendar {
            self.record_day(*date, day);
        }
        for (name, totals) in &other.repos {
            self.record_repo(name, totals);
        }
        for (name, totals) in &other.languages {
            self.record_language(name, totals);
        }
    }
}

/// Headline numbers derived from a merged package
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct NumericSummary {
    pub total_contribs: u64,
    pub total_commits: u64,
    pub total_issues: u64,
    pub total_prs: u64,
    pub total_reviews: u64,
    pub total_repos_created: u64,
    pub active_days: u32,
    /// Earliest day with the highest contribution count
    pub best_day: Option<(NaiveDate, u64)>,
    pub longest_streak: u32,
}
