//! End-to-end runs of the tracking pipeline against an in-memory fetcher

use chrono::{DateTime, NaiveDate, Utc};
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use trendscope_lib::facts::raw_signal::{RepositoryPayload, SignalPayload, TrendingEntry};
use trendscope_lib::facts::{
    Cache, Collector, CollectorConfig, FetchError, Progress, RawSignal, RepoId, RetryPolicy, SilentProgress, SourceFetcher,
    SourceTag, TrendingWindow,
};
use trendscope_lib::history::HistoryStore;
use trendscope_lib::pipeline::{RunOutcome, run_pipeline};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
}

fn fetched_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_771_977_600, 0).unwrap()
}

fn trending(repo: &str, stars: u64) -> RawSignal {
    RawSignal {
        fetched_at: fetched_at(),
        payload: SignalPayload::Trending(TrendingEntry {
            repo_path: format!("/{repo}"),
            description: Some("An llm toolkit".to_string()),
            language: Some("Python".to_string()),
            stars_text: stars.to_string(),
            forks_text: None,
            gained_text: Some("10".to_string()),
        }),
    }
}

fn repository(repo: &str, stars: i64) -> RepositoryPayload {
    RepositoryPayload {
        full_name: Some(repo.to_string()),
        name: repo.split('/').nth(1).map(ToString::to_string),
        html_url: Some(format!("https://github.com/{repo}")),
        description: Some("An llm toolkit".to_string()),
        language: Some("Python".to_string()),
        stargazers_count: Some(stars),
        ..RepositoryPayload::default()
    }
}

fn keyword(repo: &str, stars: i64) -> RawSignal {
    RawSignal {
        fetched_at: fetched_at(),
        payload: SignalPayload::Keyword(repository(repo, stars)),
    }
}

fn watched(repo: &str, stars: i64) -> RawSignal {
    RawSignal {
        fetched_at: fetched_at(),
        payload: SignalPayload::Watchlist(repository(repo, stars).into()),
    }
}

/// Fetcher answering from fixed tables. Unknown watchlist entries are rate limited.
#[derive(Debug, Default)]
struct FakeFetcher {
    trending: Vec<RawSignal>,
    keywords: HashMap<String, Vec<RawSignal>>,
    watchlist: HashMap<String, RawSignal>,
    watchlist_calls: AtomicU32,
}

impl SourceFetcher for FakeFetcher {
    async fn fetch_trending(&self, _language: Option<&str>, _since: TrendingWindow) -> Result<Vec<RawSignal>, FetchError> {
        Ok(self.trending.clone())
    }

    async fn fetch_keyword_matches(&self, keyword: &str) -> Result<Vec<RawSignal>, FetchError> {
        Ok(self.keywords.get(keyword).cloned().unwrap_or_default())
    }

    async fn fetch_watchlist_status(&self, repo_id: &RepoId) -> Result<RawSignal, FetchError> {
        let _ = self.watchlist_calls.fetch_add(1, Ordering::Relaxed);
        self.watchlist
            .get(repo_id.key())
            .cloned()
            .ok_or(FetchError::RateLimited { reset_at: Some(Utc::now()) })
    }
}

fn config(watchlist: &[&str]) -> CollectorConfig {
    CollectorConfig {
        keywords: vec!["llm".to_string()],
        watchlist: watchlist.iter().map(|repo| RepoId::parse(repo).unwrap()).collect(),
        trending_languages: Vec::new(),
        trending_since: TrendingWindow::Daily,
        filter_trending_by_keywords: false,
        serve_stale_on_failure: false,
        cache_ttl: Duration::from_secs(3600),
        rate_limit_buffer: 0,
        max_concurrent_requests: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_rate_limit_wait: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(5),
        },
    }
}

async fn run_once(fetcher: FakeFetcher, config: CollectorConfig, cache_dir: &std::path::Path, store: &HistoryStore, run_date: NaiveDate) -> RunOutcome {
    let progress: Arc<dyn Progress> = Arc::new(SilentProgress);
    let cache = Cache::new(cache_dir, Utc::now(), true);
    let collector = Collector::new(fetcher, cache, config, progress).await.unwrap();
    run_pipeline(&collector, store, run_date, 50, None).await.unwrap()
}

fn scenario_fetcher() -> FakeFetcher {
    FakeFetcher {
        trending: vec![trending("shared/repo", 100), trending("only/trending", 5), trending("other/trending", 7)],
        keywords: HashMap::from([("llm".to_string(), vec![keyword("shared/repo", 120), keyword("only/keyword", 3)])]),
        ..FakeFetcher::default()
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_overlapping_sources_merge_into_one_record() {
    let tmp = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();

    let outcome = run_once(scenario_fetcher(), config(&[]), &tmp.path().join("cache"), &store, date(25)).await;

    assert_eq!(outcome.snapshot.len(), 4);
    let shared = outcome.snapshot.get(&RepoId::parse("shared/repo").unwrap()).unwrap();
    assert_eq!(shared.star_count, 120);
    assert_eq!(
        shared.sources,
        BTreeSet::from([SourceTag::Trending, SourceTag::Keyword("llm".to_string())])
    );
    assert_eq!(outcome.diagnostics.trending.fetched, 1);
    assert_eq!(outcome.diagnostics.keyword.fetched, 1);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_first_run_marks_everything_new() {
    let tmp = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();
    assert!(store.read_latest_before(date(25)).is_none());

    let outcome = run_once(scenario_fetcher(), config(&[]), &tmp.path().join("cache"), &store, date(25)).await;

    assert!(outcome.prior.is_none());
    assert_eq!(outcome.diff.new_projects.len(), outcome.snapshot.len());
    assert!(outcome.diff.rising_projects.is_empty());
    assert!(outcome.diff.watchlist_changes.is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_rate_limited_watchlist_degrades() {
    let tmp = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();

    let fetcher = FakeFetcher {
        watchlist: HashMap::from([("ok/repo".to_string(), watched("ok/repo", 10))]),
        ..scenario_fetcher()
    };

    let progress: Arc<dyn Progress> = Arc::new(SilentProgress);
    let cache = Cache::new(tmp.path().join("cache"), Utc::now(), true);
    let collector = Collector::new(fetcher, cache, config(&["ok/repo", "limited/repo"]), progress).await.unwrap();
    let outcome = run_pipeline(&collector, &store, date(25), 50, None).await.unwrap();

    // one call for the healthy repo, every attempt for the limited one
    assert_eq!(collector.fetcher().watchlist_calls.load(Ordering::Relaxed), 1 + 3);
    assert_eq!(outcome.diagnostics.watchlist.failed, 1);
    assert_eq!(outcome.diagnostics.watchlist.fetched, 1);
    assert!(outcome.snapshot.get(&RepoId::parse("limited/repo").unwrap()).is_none());
    assert!(outcome.snapshot.get(&RepoId::parse("ok/repo").unwrap()).unwrap().is_watchlisted());
    assert!(store.read(date(25)).unwrap().is_some());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_rerun_for_same_date_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();

    let first = run_once(scenario_fetcher(), config(&[]), &cache_dir, &store, date(25)).await;
    let second = run_once(scenario_fetcher(), config(&[]), &cache_dir, &store, date(25)).await;

    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(store.read(date(25)).unwrap().unwrap(), second.snapshot);
    assert_eq!(store.dates().unwrap(), vec![date(25)]);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_next_day_compares_against_prior_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();

    let day_one = FakeFetcher {
        watchlist: HashMap::from([("watched/repo".to_string(), watched("watched/repo", 1000))]),
        ..scenario_fetcher()
    };
    let first = run_once(day_one, config(&["watched/repo"]), &cache_dir, &store, date(24)).await;

    let day_two = FakeFetcher {
        trending: vec![trending("shared/repo", 300), trending("brand/new", 1)],
        watchlist: HashMap::from([("watched/repo".to_string(), watched("watched/repo", 990))]),
        ..FakeFetcher::default()
    };
    let second = run_once(day_two, config(&["watched/repo"]), &cache_dir, &store, date(25)).await;

    assert_eq!(second.prior.as_ref().unwrap(), &first.snapshot);
    assert_eq!(store.read_latest_before(date(26)).unwrap(), second.snapshot);

    let new: Vec<_> = second.diff.new_projects.iter().map(|e| e.record.repo_id.to_string()).collect();
    assert_eq!(new, vec!["brand/new"]);

    let rising: Vec<_> = second.diff.rising_projects.iter().map(|e| e.record.repo_id.to_string()).collect();
    assert_eq!(rising, vec!["shared/repo"]);
    assert_eq!(second.diff.rising_projects[0].star_delta(), Some(180));

    assert_eq!(second.diff.watchlist_changes.len(), 1);
    assert_eq!(second.diff.watchlist_changes[0].star_delta(), Some(-10));

    let shared = second.snapshot.get(&RepoId::parse("shared/repo").unwrap()).unwrap();
    assert_eq!(shared.first_seen_date, date(24));
    assert_eq!(shared.last_seen_date, date(25));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_first_seen_date_survives_a_missed_day() {
    let tmp = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();

    for (day, repo) in [(1, "a/b"), (2, "c/d"), (3, "a/b")] {
        let fetcher = FakeFetcher {
            trending: vec![trending(repo, 10)],
            ..FakeFetcher::default()
        };
        let cache_dir = tmp.path().join(format!("cache-{day}"));
        let outcome = run_once(fetcher, config(&[]), &cache_dir, &store, date(day)).await;

        if day == 3 {
            let ab = outcome.snapshot.get(&RepoId::parse("a/b").unwrap()).unwrap();
            assert_eq!(ab.first_seen_date, date(1));
            assert_eq!(ab.last_seen_date, date(3));

            // Still reported as new: the diff is against day 2 only
            let new: Vec<_> = outcome.diff.new_projects.iter().map(|e| e.record.repo_id.to_string()).collect();
            assert_eq!(new, vec!["a/b"]);
        }
    }

    let archived = store.read(date(3)).unwrap().unwrap();
    assert_eq!(archived.get(&RepoId::parse("a/b").unwrap()).unwrap().first_seen_date, date(1));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_run_timeout_writes_nothing() {
    #[derive(Debug)]
    struct SlowFetcher;

    impl SourceFetcher for SlowFetcher {
        async fn fetch_trending(&self, _language: Option<&str>, _since: TrendingWindow) -> Result<Vec<RawSignal>, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn fetch_keyword_matches(&self, _keyword: &str) -> Result<Vec<RawSignal>, FetchError> {
            Ok(Vec::new())
        }

        async fn fetch_watchlist_status(&self, repo_id: &RepoId) -> Result<RawSignal, FetchError> {
            Err(FetchError::NotFound(repo_id.to_string()))
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(tmp.path().join("data")).await.unwrap();
    let progress: Arc<dyn Progress> = Arc::new(SilentProgress);
    let cache = Cache::new(tmp.path().join("cache"), Utc::now(), true);
    let collector = Collector::new(SlowFetcher, cache, config(&[]), progress).await.unwrap();

    let result = run_pipeline(&collector, &store, date(25), 50, Some(Duration::from_millis(50))).await;

    assert!(result.is_err());
    assert!(store.read(date(25)).unwrap().is_none());
    assert!(!store.dataset_path().exists());
}
