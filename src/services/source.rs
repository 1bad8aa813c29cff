//! Upstream activity source
//!
//! Provides the GraphQL adapter that fetches one closed date interval of a
//! user's contributions and converts it into a [`UserPackage`].

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::access_keys::AccessKeyRing;
use crate::types::{CalendarDay, LanguageTotals, RepoTotals, UserPackage};

/// GitHub GraphQL endpoint
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Max repositories requested per contribution kind
const MAX_REPOSITORIES: u32 = 100;

const CONTRIBUTIONS_QUERY: &str = r#"
query($login: String!, $from: DateTime!, $to: DateTime!, $max: Int!) {
  user(login: $login) {
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar { weeks { contributionDays { date contributionCount } } }
      commitContributionsByRepository(maxRepositories: $max) { ...repoContribs }
      issueContributionsByRepository(maxRepositories: $max) { ...repoContribs }
      pullRequestContributionsByRepository(maxRepositories: $max) { ...repoContribs }
      pullRequestReviewContributionsByRepository(maxRepositories: $max) { ...repoContribs }
      repositoryContributions(first: $max) { nodes { occurredAt } }
    }
  }
}
fragment repoContribs on ContributionsByRepository {
  repository { nameWithOwner isPrivate primaryLanguage { name color } }
  contributions { totalCount }
}
"#;

/// Data source failures as seen by the month fetcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Upstream rate limit hit. Not retried.
    #[error("rate limited")]
    RateLimited,

    /// Anything else, including timeouts
    #[error("{0}")]
    Other(String),
}

/// Upstream provider of per-interval activity
pub trait DataSource: Send + Sync {
    /// Fetch the closed interval `[start, end]`, with day boundaries taken in `tz`.
    ///
    /// With `suppress_errors`, partial upstream errors are tolerated as long as
    /// some data came back.
    fn fetch(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        tz: Tz,
        suppress_errors: bool,
    ) -> std::result::Result<UserPackage, SourceError>;
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    contributions_collection: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
    #[serde(default)]
    commit_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    issue_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    pull_request_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    pull_request_review_contributions_by_repository: Vec<RepoContributions>,
    #[serde(default)]
    repository_contributions: Option<RepositoryContributions>,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    weeks: Vec<Week>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Week {
    contribution_days: Vec<ContributionDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionDay {
    date: NaiveDate,
    contribution_count: u64,
}

#[derive(Debug, Deserialize)]
struct RepoContributions {
    repository: Repository,
    contributions: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    name_with_owner: String,
    #[serde(default)]
    is_private: bool,
    primary_language: Option<Language>,
}

#[derive(Debug, Deserialize)]
struct Language {
    name: String,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct RepositoryContributions {
    #[serde(default)]
    nodes: Vec<OccurredAt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OccurredAt {
    occurred_at: DateTime<Utc>,
}

#[derive(Clone, Copy)]
enum ContributionKind {
    Commit,
    Issue,
    PullRequest,
    Review,
}

impl ContributionsCollection {
    fn into_package(self, start: NaiveDate, end: NaiveDate, tz: Tz) -> UserPackage {
        let mut pkg = UserPackage::empty();

        for day in self
            .contribution_calendar
            .weeks
            .iter()
            .flat_map(|w| w.contribution_days.iter())
            .filter(|d| d.date >= start && d.date <= end)
        {
            pkg.record_day(
                day.date,
                &CalendarDay {
                    contribs: day.contribution_count,
                    repos_created: 0,
                },
            );
        }

        if let Some(created) = &self.repository_contributions {
            for node in &created.nodes {
                let date = node.occurred_at.with_timezone(&tz).date_naive();
                if date >= start && date <= end {
                    pkg.record_day(
                        date,
                        &CalendarDay {
                            contribs: 0,
                            repos_created: 1,
                        },
                    );
                }
            }
        }

        let groups = [
            (ContributionKind::Commit, &self.commit_contributions_by_repository),
            (ContributionKind::Issue, &self.issue_contributions_by_repository),
            (
                ContributionKind::PullRequest,
                &self.pull_request_contributions_by_repository,
            ),
            (
                ContributionKind::Review,
                &self.pull_request_review_contributions_by_repository,
            ),
        ];

        for (kind, group) in groups {
            for entry in group.iter() {
                let count = entry.contributions.total_count;
                let mut totals = RepoTotals {
                    contribs: count,
                    private: entry.repository.is_private,
                    ..Default::default()
                };
                match kind {
                    ContributionKind::Commit => totals.commits = count,
                    ContributionKind::Issue => totals.issues = count,
                    ContributionKind::PullRequest => totals.prs = count,
                    ContributionKind::Review => totals.reviews = count,
                }
                pkg.record_repo(&entry.repository.name_with_owner, &totals);

                if let Some(lang) = &entry.repository.primary_language {
                    pkg.record_language(
                        &lang.name,
                        &LanguageTotals {
                            contribs: count,
                            color: lang.color.clone(),
                        },
                    );
                }
            }
        }

        pkg
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

/// Interpret a GraphQL HTTP response
fn parse_response(
    status: StatusCode,
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
    tz: Tz,
    suppress_errors: bool,
) -> std::result::Result<UserPackage, SourceError> {
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && is_rate_limit_message(body))
    {
        return Err(SourceError::RateLimited);
    }
    if !status.is_success() {
        return Err(SourceError::Other(format!("HTTP {}", status)));
    }

    let response: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Other(format!("JSON parse error: {}", e)))?;

    if response
        .errors
        .iter()
        .any(|e| e.kind.as_deref() == Some("RATE_LIMITED") || is_rate_limit_message(&e.message))
    {
        return Err(SourceError::RateLimited);
    }

    if !response.errors.is_empty() && !(suppress_errors && response.data.is_some()) {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(SourceError::Other(messages.join("; ")));
    }

    let user = response
        .data
        .and_then(|d| d.user)
        .ok_or_else(|| SourceError::Other("user not found".into()))?;

    Ok(user.contributions_collection.into_package(start, end, tz))
}

/// Day bounds of `[start, end]` as RFC 3339 timestamps in `tz`
fn interval_bounds(
    start: NaiveDate,
    end: NaiveDate,
    tz: Tz,
) -> std::result::Result<(String, String), SourceError> {
    let from = tz
        .from_local_datetime(&start.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| SourceError::Other(format!("invalid start {}", start)))?;
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let to = tz
        .from_local_datetime(&end.and_time(last))
        .latest()
        .ok_or_else(|| SourceError::Other(format!("invalid end {}", end)))?;
    Ok((from.to_rfc3339(), to.to_rfc3339()))
}

/// HTTP GraphQL data source
pub struct GraphQlSource {
    client: reqwest::blocking::Client,
    endpoint: String,
    keys: AccessKeyRing,
}

impl GraphQlSource {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        keys: AccessKeyRing,
    ) -> crate::types::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wrapstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::types::WrapError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            keys,
        })
    }
}

impl DataSource for GraphQlSource {
    fn fetch(
        &self,
        user_id: &str,
        access_token: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        tz: Tz,
        suppress_errors: bool,
    ) -> std::result::Result<UserPackage, SourceError> {
        let token = match access_token {
            Some(t) => t.to_string(),
            None => self
                .keys
                .next()
                .ok_or_else(|| SourceError::Other("no access token available".into()))?,
        };

        let (from, to) = interval_bounds(start, end, tz)?;
        let body = serde_json::json!({
            "query": CONTRIBUTIONS_QUERY,
            "variables": { "login": user_id, "from": from, "to": to, "max": MAX_REPOSITORIES },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .map_err(|e| SourceError::Other(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| SourceError::Other(format!("HTTP body read failed: {}", e)))?;

        parse_response(status, &text, start, end, tz, suppress_errors)
    }
}
