use anyhow::Context;
use chrono::{Duration, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, DEFAULT_REPORTING_TIMEZONE};
use crate::services::cache_bust;
use crate::services::source::DEFAULT_GRAPHQL_URL;
use crate::services::{
    AccessKeyRing, CacheBuster, Clock, FileMonthStore, GraphQlSource, QueryOrchestrator,
    SystemClock, WrappedService,
};
use crate::types::{DateRange, NumericSummary, UserPackage};

/// Languages shown in the text report
const TOP_LANGUAGES: usize = 5;

/// Incremental month-by-month wrapped statistics
#[derive(Parser)]
#[command(name = "wrapstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Month store directory (default: ~/.wrapstats)
    #[arg(long, global = true, env = "WRAPSTATS_STORE")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a user's aggregate, fetching only missing months
    Query {
        #[arg(long)]
        user: String,

        /// Access token (falls back to shared keys)
        #[arg(long, env = "WRAPSTATS_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Include private contributions
        #[arg(long)]
        private: bool,

        /// First day, YYYY-MM-DD (default: 365 days before --end)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// List stored months for a user
    Months {
        #[arg(long)]
        user: String,

        #[arg(long)]
        private: bool,
    },

    /// Delete every stored month for a user
    Clear {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    #[arg(long, env = "WRAPSTATS_GRAPHQL_URL", default_value = DEFAULT_GRAPHQL_URL)]
    graphql_url: String,

    /// IANA timezone that defines day boundaries
    #[arg(long, env = "WRAPSTATS_TIMEZONE", default_value = DEFAULT_REPORTING_TIMEZONE)]
    timezone: String,

    /// Months fetched at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Sibling instance to notify after multi-month backfills
    #[arg(long, env = "WRAPSTATS_BUST_ENDPOINT")]
    bust_endpoint: Option<String>,
}

#[derive(Serialize)]
struct QueryReport<'a> {
    user: &'a str,
    private: bool,
    range: DateRange,
    summary: Option<NumericSummary>,
    aggregate: Option<&'a UserPackage>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Query {
                user,
                token,
                private,
                start,
                end,
                json,
                fetch,
            } => {
                let config = self.query_config(fetch);
                config.validate()?;

                let keys = AccessKeyRing::default();
                let store = Arc::new(FileMonthStore::from_config(&config, keys.clone())?);
                let source = Arc::new(GraphQlSource::new(
                    &config.graphql_url,
                    config.request_timeout(),
                    keys,
                )?);
                let clock: Arc<dyn Clock> = Arc::new(SystemClock);
                let buster: Arc<dyn CacheBuster> =
                    Arc::from(cache_bust::from_endpoint(config.bust_endpoint.as_deref())?);
                let orchestrator =
                    QueryOrchestrator::new(source, store, clock.clone(), buster, &config)?;
                let service =
                    WrappedService::with_clock(orchestrator, clock.clone(), config.cache_ttl());

                let today = clock
                    .now()
                    .with_timezone(&config.reporting_tz()?)
                    .date_naive();
                let range = resolve_range(*start, *end, today)?;

                // Memo is always empty in a one-shot process
                let aggregate = service
                    .query(user, token.as_deref(), *private, range, false)
                    .with_context(|| format!("query for {} failed", user))?;

                if *json {
                    let report = QueryReport {
                        user,
                        private: *private,
                        range,
                        summary: aggregate.as_ref().map(UserPackage::numeric),
                        aggregate: aggregate.as_ref(),
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_report(user, range, aggregate.as_ref());
                }
                Ok(())
            }
            Commands::Months { user, private } => {
                let store = FileMonthStore::from_config(&self.config(), AccessKeyRing::default())?;
                let months = store.list_months(user, *private)?;
                if months.is_empty() {
                    println!("No stored months for {}", user);
                }
                for month in months {
                    println!("{}", month.format("%Y-%m"));
                }
                Ok(())
            }
            Commands::Clear { user } => {
                let store = FileMonthStore::from_config(&self.config(), AccessKeyRing::default())?;
                if store.clear_user(user)? {
                    println!("Cleared stored months for {}", user);
                } else {
                    println!("No stored months for {}", user);
                }
                Ok(())
            }
        }
    }

    fn config(&self) -> Config {
        Config {
            store_dir: self.store_dir.clone(),
            ..Default::default()
        }
    }

    fn query_config(&self, fetch: &FetchArgs) -> Config {
        Config {
            graphql_url: fetch.graphql_url.clone(),
            reporting_timezone: fetch.timezone.clone(),
            fetch_concurrency: fetch.concurrency,
            bust_endpoint: fetch.bust_endpoint.clone(),
            ..self.config()
        }
    }
}

/// Fill missing bounds: `end` defaults to today, `start` to 365 days before `end`
fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> crate::types::Result<DateRange> {
    match (start, end) {
        (None, None) => Ok(DateRange::trailing_year(today)),
        (start, end) => {
            let end = end.unwrap_or(today);
            let start = start.unwrap_or(end - Duration::days(365));
            DateRange::new(start, end)
        }
    }
}

fn print_report(user: &str, range: DateRange, aggregate: Option<&UserPackage>) {
    println!("{} ({} .. {})", user, range.start, range.end);

    let Some(pkg) = aggregate else {
        println!("  no data available");
        return;
    };

    let summary = pkg.numeric();
    println!("  contributions   {}", summary.total_contribs);
    println!("  commits         {}", summary.total_commits);
    println!("  pull requests   {}", summary.total_prs);
    println!("  issues          {}", summary.total_issues);
    println!("  reviews         {}", summary.total_reviews);
    println!("  repos created   {}", summary.total_repos_created);
    println!("  active days     {}", summary.active_days);
    println!("  longest streak  {}", summary.longest_streak);
    if let Some((date, contribs)) = summary.best_day {
        println!("  best day        {} ({})", date, contribs);
    }

    let mut languages: Vec<_> = pkg.languages.iter().collect();
    languages.sort_by(|a, b| b.1.contribs.cmp(&a.1.contribs).then(a.0.cmp(b.0)));
    if !languages.is_empty() {
        println!("  languages:");
        for (name, totals) in languages.into_iter().take(TOP_LANGUAGES) {
            println!("    {:<14}{}", name, totals.contribs);
        }
    }
}
