//! Criterion benchmarks for month merging and summary derivation

use chrono::{Datelike, Duration, NaiveDate};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use wrapstats::services::Aggregator;
use wrapstats::types::{CalendarDay, LanguageTotals, RepoTotals, UserPackage};

const LANGUAGES: [&str; 6] = ["Rust", "Go", "Python", "TypeScript", "C", "Shell"];

/// A busy month: every day active, `repos` repositories touched
fn make_month(month: u32, repos: usize) -> UserPackage {
    let start = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
    let mut pkg = UserPackage::empty();

    let mut day = start;
    while day.month() == month {
        pkg.record_day(
            day,
            &CalendarDay {
                contribs: u64::from(day.day() % 7 + 1),
                repos_created: u64::from(day.day() == 1),
            },
        );
        day += Duration::days(1);
    }

    for i in 0..repos {
        pkg.record_repo(
            &format!("octo/repo-{}", i),
            &RepoTotals {
                contribs: 10,
                commits: 6,
                prs: 2,
                reviews: 2,
                ..Default::default()
            },
        );
        pkg.record_language(
            LANGUAGES[i % LANGUAGES.len()],
            &LanguageTotals {
                contribs: 10,
                color: None,
            },
        );
    }
    pkg
}

fn bench_merge_year(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator");

    for repos in [10usize, 100] {
        let months: Vec<UserPackage> = (1..=12).map(|m| make_month(m, repos)).collect();
        group.throughput(Throughput::Elements(months.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("merge_12_months", format!("{} repos", repos)),
            &months,
            |b, months| {
                b.iter(|| Aggregator::merge(black_box(months)));
            },
        );
    }

    group.finish();
}

fn bench_numeric(c: &mut Criterion) {
    let months: Vec<UserPackage> = (1..=12).map(|m| make_month(m, 100)).collect();
    let merged = Aggregator::merge_or_identity(&months);

    let mut group = c.benchmark_group("aggregator");
    group.bench_function("numeric_summary", |b| {
        b.iter(|| black_box(&merged).numeric());
    });
    group.finish();
}

criterion_group!(benches, bench_merge_year, bench_numeric);
criterion_main!(benches);
