//! End-to-end query flow: GraphQL source (mocked HTTP) + file month store

use chrono::{NaiveDate, TimeZone, Utc};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use wrapstats::config::Config;
use wrapstats::services::{
    AccessKeyRing, FileMonthStore, GraphQlSource, ManualClock, MonthStore, NoopCacheBuster,
    QueryOrchestrator, WrappedService,
};
use wrapstats::types::DateRange;

const BODY: &str = r##"{
  "data": {
    "user": {
      "contributionsCollection": {
        "contributionCalendar": { "weeks": [
          { "contributionDays": [
            { "date": "2024-01-15", "contributionCount": 4 },
            { "date": "2024-02-10", "contributionCount": 6 }
          ] }
        ] },
        "commitContributionsByRepository": [
          { "repository": { "nameWithOwner": "octo/app", "isPrivate": false,
                            "primaryLanguage": { "name": "Rust", "color": "#dea584" } },
            "contributions": { "totalCount": 5 } }
        ],
        "issueContributionsByRepository": [],
        "pullRequestContributionsByRepository": [],
        "pullRequestReviewContributionsByRepository": [],
        "repositoryContributions": { "nodes": [] }
      }
    }
  }
}"##;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_service(server_url: &str, root: &TempDir) -> (WrappedService, Arc<FileMonthStore>) {
    let keys = AccessKeyRing::default();
    let store = Arc::new(FileMonthStore::with_root(root.path().to_path_buf(), keys.clone()));
    let source = Arc::new(GraphQlSource::new(server_url, Duration::from_secs(5), keys).unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
    ));
    let config = Config {
        graphql_url: server_url.to_string(),
        reporting_timezone: "UTC".to_string(),
        fetch_concurrency: 2,
        ..Default::default()
    };
    let orchestrator = QueryOrchestrator::new(
        source,
        store.clone(),
        clock.clone(),
        Arc::new(NoopCacheBuster),
        &config,
    )
    .unwrap();
    (
        WrappedService::with_clock(orchestrator, clock, config.cache_ttl()),
        store,
    )
}

#[test]
fn test_backfill_then_serve_from_store() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer k1")
        .match_body(Matcher::PartialJsonString(
            r#"{"variables": {"login": "octocat"}}"#.to_string(),
        ))
        .with_status(200)
        .with_body(BODY)
        .expect(2)
        .create();

    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("access_keys.json"), r#"["k1"]"#).unwrap();
    let range = DateRange::new(date(2024, 1, 1), date(2024, 2, 29)).unwrap();

    let (service, store) = make_service(&server.url(), &temp);
    let aggregate = service
        .query("octocat", None, false, range, false)
        .unwrap()
        .unwrap();

    // Each month keeps only its own days; repo totals add across months
    assert_eq!(aggregate.calendar.len(), 2);
    assert_eq!(aggregate.calendar[&date(2024, 1, 15)].contribs, 4);
    assert_eq!(aggregate.calendar[&date(2024, 2, 10)].contribs, 6);
    assert_eq!(aggregate.repos["octo/app"].commits, 10);
    assert_eq!(aggregate.languages["Rust"].contribs, 10);
    assert_eq!(aggregate.numeric().total_contribs, 10);

    assert_eq!(
        store.list_months("octocat", false).unwrap(),
        vec![date(2024, 1, 1), date(2024, 2, 1)]
    );
    let records = store
        .load_range("octocat", false, range.start, range.end)
        .unwrap();
    assert!(records.iter().all(|r| r.complete));

    // A fresh process has no memo, but both months are complete on disk
    let (restarted, _) = make_service(&server.url(), &temp);
    let again = restarted
        .query("octocat", None, false, range, false)
        .unwrap()
        .unwrap();
    assert_eq!(again, aggregate);

    mock.assert();
}

#[test]
fn test_rate_limited_upstream_persists_nothing() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/")
        .with_status(429)
        .expect(1)
        .create();

    let temp = TempDir::new().unwrap();
    let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap();

    let (service, store) = make_service(&server.url(), &temp);
    let result = service
        .query("octocat", Some("user-token"), false, range, false)
        .unwrap();

    assert!(result.is_none());
    assert!(store.list_months("octocat", false).unwrap().is_empty());
    mock.assert();
}
