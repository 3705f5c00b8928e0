use super::cache::Cache;
use super::normalizer::normalize;
use super::path_utils::unique_path_component;
use super::progress::Progress;
use super::request_tracker::RequestTracker;
use super::signal_cache::{Origin, SignalCache};
use super::throttler::Throttler;
use super::{FetchError, ProjectRecord, RateLimitInfo, RawSignal, RepoId, RetryPolicy, SourceFetcher, SourceKind, SourceTag, TrendingWindow};
use crate::Result;
use crate::dir_lock::{DirLockGuard, acquire_lock};
use chrono::NaiveDate;
use core::time::Duration;
use futures_util::future::join_all;
use ohno::IntoAppError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

const LOG_TARGET: &str = " collector";

/// What to fetch and how.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub keywords: Vec<String>,
    pub watchlist: Vec<RepoId>,
    /// Empty means global trending only.
    pub trending_languages: Vec<String>,
    pub trending_since: TrendingWindow,
    pub filter_trending_by_keywords: bool,
    pub serve_stale_on_failure: bool,
    pub cache_ttl: Duration,
    pub rate_limit_buffer: u64,
    pub max_concurrent_requests: usize,
    pub retry: RetryPolicy,
}

/// Per-source outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Fetch units attempted.
    pub units: u64,
    /// Units fetched from the source during this run.
    pub fetched: u64,
    /// Units served from a fresh cache entry.
    pub cached: u64,
    /// Subset of `cached` served from an expired entry after a failed fetch.
    pub stale: u64,
    /// Units that produced no signals.
    pub failed: u64,
    /// Subset of `failed` caused by authentication problems.
    pub auth_failures: u64,
}

/// Everything a run reports about its own coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunDiagnostics {
    pub trending: SourceStats,
    pub keyword: SourceStats,
    pub watchlist: SourceStats,
    pub skipped_malformed: u64,
    pub filtered_out: u64,
    pub quota: Option<RateLimitInfo>,
}

impl RunDiagnostics {
    #[must_use]
    pub const fn source(&self, kind: SourceKind) -> &SourceStats {
        match kind {
            SourceKind::Trending => &self.trending,
            SourceKind::Keyword => &self.keyword,
            SourceKind::Watchlist => &self.watchlist,
        }
    }

    const fn source_mut(&mut self, kind: SourceKind) -> &mut SourceStats {
        match kind {
            SourceKind::Trending => &mut self.trending,
            SourceKind::Keyword => &mut self.keyword,
            SourceKind::Watchlist => &mut self.watchlist,
        }
    }

    #[must_use]
    pub const fn total_failed(&self) -> u64 {
        self.trending.failed + self.keyword.failed + self.watchlist.failed
    }
}

/// Normalized records from every source, not yet merged.
#[derive(Debug, Clone)]
pub struct Collection {
    pub records: Vec<ProjectRecord>,
    pub diagnostics: RunDiagnostics,
}

/// One independent fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchUnit {
    Trending(Option<String>),
    Keyword(String),
    Watchlist(RepoId),
}

impl FetchUnit {
    fn tag(&self) -> SourceTag {
        match self {
            Self::Trending(_) => SourceTag::Trending,
            Self::Keyword(kw) => SourceTag::Keyword(kw.clone()),
            Self::Watchlist(_) => SourceTag::Watchlist,
        }
    }

    const fn kind(&self) -> SourceKind {
        match self {
            Self::Trending(_) => SourceKind::Trending,
            Self::Keyword(_) => SourceKind::Keyword,
            Self::Watchlist(_) => SourceKind::Watchlist,
        }
    }

    /// What the unit asks the source for, case-folded. Units with equal identities are one fetch.
    fn identity(&self) -> (SourceKind, Option<String>) {
        let param = match self {
            Self::Trending(language) => language.as_deref().map(|l| l.trim().to_lowercase()),
            Self::Keyword(kw) => Some(kw.trim().to_lowercase()),
            Self::Watchlist(repo) => Some(repo.key().to_string()),
        };
        (self.kind(), param)
    }

    fn cache_key(&self, since: TrendingWindow) -> String {
        match self.identity() {
            (SourceKind::Trending, None) => format!("trending/all-{}.json", since.as_str()),
            (SourceKind::Trending, Some(language)) => {
                format!("trending/{}-{}.json", unique_path_component(&language), since.as_str())
            }
            (kind, param) => format!("{kind}/{}.json", unique_path_component(&param.unwrap_or_default())),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Trending(Some(language)) => format!("{language} trending"),
            Self::Trending(None) => "trending".to_string(),
            Self::Keyword(kw) => format!("keyword '{kw}'"),
            Self::Watchlist(repo) => format!("watched repository '{repo}'"),
        }
    }
}

enum UnitResult {
    Signals(Arc<Vec<RawSignal>>, Origin),
    Stale(Vec<RawSignal>),
    Failed(FetchError),
}

/// Gathers signals from every configured source with caching, throttling and retries.
///
/// Holds the cache directory lock for its whole lifetime.
pub struct Collector<F> {
    fetcher: F,
    signals: SignalCache,
    throttler: Arc<Throttler>,
    config: CollectorConfig,
    progress: Arc<dyn Progress>,
    _cache_lock: DirLockGuard,
}

impl<F: core::fmt::Debug> core::fmt::Debug for Collector<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collector")
            .field("fetcher", &self.fetcher)
            .field("signals", &self.signals)
            .field("throttler", &self.throttler)
            .field("config", &self.config)
            .field("progress", &"<dyn Progress>")
            .finish_non_exhaustive()
    }
}

impl<F: SourceFetcher> Collector<F> {
    pub async fn new(fetcher: F, cache: Cache, config: CollectorConfig, progress: Arc<dyn Progress>) -> Result<Self> {
        progress.set_phase("Preparing");

        fs::create_dir_all(cache.dir()).into_app_err_with(|| format!("unable to create cache directory '{}'", cache.dir().display()))?;
        let cache_lock = acquire_lock(cache.dir(), "cache.lock").await?;

        Ok(Self {
            fetcher,
            signals: SignalCache::new(cache, config.cache_ttl),
            throttler: Throttler::new(config.max_concurrent_requests),
            config,
            progress,
            _cache_lock: cache_lock,
        })
    }

    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<dyn Progress> {
        &self.progress
    }

    /// Fetch every unit concurrently and normalize the results.
    ///
    /// Failed units degrade to "no signal" and are counted in the diagnostics.
    pub async fn collect(&self, run_date: NaiveDate) -> Collection {
        self.progress.set_phase("Fetching");

        let units = self.build_units();
        let tracker = RequestTracker::new(&self.progress);
        for unit in &units {
            tracker.plan(unit.kind());
        }

        let outcomes = join_all(units.iter().map(|unit| self.run_unit(unit, &tracker))).await;

        let keywords: Vec<String> = self.config.keywords.iter().map(|kw| kw.to_lowercase()).collect();
        let mut diagnostics = RunDiagnostics::default();
        let mut records = Vec::new();

        for (unit, outcome) in units.iter().zip(outcomes) {
            let stats = diagnostics.source_mut(unit.kind());
            stats.units += 1;

            let signals: &[RawSignal] = match &outcome {
                UnitResult::Signals(signals, Origin::Live) => {
                    stats.fetched += 1;
                    signals.as_slice()
                }
                UnitResult::Signals(signals, Origin::Cached) => {
                    stats.cached += 1;
                    signals.as_slice()
                }
                UnitResult::Stale(signals) => {
                    stats.cached += 1;
                    stats.stale += 1;
                    signals.as_slice()
                }
                UnitResult::Failed(e) => {
                    stats.failed += 1;
                    if e.is_auth() {
                        stats.auth_failures += 1;
                    }
                    &[]
                }
            };

            let tag = unit.tag();
            for signal in signals {
                match normalize(signal, &tag, run_date) {
                    Ok(record) => {
                        if unit.kind() == SourceKind::Trending && self.config.filter_trending_by_keywords && !mentions_any(&record, &keywords) {
                            log::debug!(target: LOG_TARGET, "Skipping trending repository '{}': no keyword match", record.repo_id);
                            diagnostics.filtered_out += 1;
                            continue;
                        }
                        records.push(record);
                    }
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "Skipping signal from {}: {e}", unit.label());
                        diagnostics.skipped_malformed += 1;
                    }
                }
            }
        }

        diagnostics.quota = self.fetcher.quota();
        if let Some(quota) = diagnostics.quota
            && quota.remaining < self.config.rate_limit_buffer
        {
            log::warn!(
                target: LOG_TARGET,
                "GitHub API quota is running low: {} requests remaining until {}",
                quota.remaining,
                quota.reset_at.with_timezone(&chrono::Local).format("%T")
            );
        }

        log::info!(
            target: LOG_TARGET,
            "Collected {} record(s) from {} unit(s), {} failed",
            records.len(),
            units.len(),
            diagnostics.total_failed()
        );

        Collection { records, diagnostics }
    }

    fn build_units(&self) -> Vec<FetchUnit> {
        let trending: Vec<FetchUnit> = if self.config.trending_languages.is_empty() {
            vec![FetchUnit::Trending(None)]
        } else {
            self.config
                .trending_languages
                .iter()
                .map(|lang| FetchUnit::Trending(Some(lang.clone())))
                .collect()
        };

        let keywords = self.config.keywords.iter().map(|kw| FetchUnit::Keyword(kw.clone()));
        let watchlist = self.config.watchlist.iter().map(|repo| FetchUnit::Watchlist(repo.clone()));

        let mut seen = HashSet::new();
        trending
            .into_iter()
            .chain(keywords)
            .chain(watchlist)
            .filter(|unit| {
                let fresh = seen.insert(unit.identity());
                if !fresh {
                    log::debug!(target: LOG_TARGET, "Ignoring duplicate {}", unit.label());
                }
                fresh
            })
            .collect()
    }

    async fn run_unit(&self, unit: &FetchUnit, tracker: &RequestTracker) -> UnitResult {
        let key = unit.cache_key(self.config.trending_since);
        let label = unit.label();
        let label = label.as_str();

        let result = self.signals.get(&key, move || self.fetch_with_retry(unit, label, tracker)).await;
        let outcome = match result {
            Ok(hit) => UnitResult::Signals(hit.signals, hit.origin),
            Err(e) => self.degrade(&key, label, e),
        };

        tracker.finish(unit.kind(), !matches!(outcome, UnitResult::Failed(_)));
        outcome
    }

    /// Fall back to an expired cache entry when allowed, else give up on the unit.
    fn degrade(&self, key: &str, label: &str, e: FetchError) -> UnitResult {
        if self.config.serve_stale_on_failure
            && let Some((signals, written_at)) = self.signals.load_stale(key)
        {
            log::warn!(
                target: LOG_TARGET,
                "Could not fetch {label} ({e}), using cached data from {}",
                written_at.format("%Y-%m-%d %H:%M UTC")
            );
            return UnitResult::Stale(signals);
        }

        if e.is_auth() {
            log::error!(target: LOG_TARGET, "Could not fetch {label}, coverage is reduced: {e}");
        } else {
            log::warn!(target: LOG_TARGET, "Could not fetch {label}: {e}");
        }
        UnitResult::Failed(e)
    }

    async fn fetch_with_retry(&self, unit: &FetchUnit, label: &str, tracker: &RequestTracker) -> core::result::Result<Vec<RawSignal>, FetchError> {
        let kind = unit.kind();

        self.config
            .retry
            .execute(
                label,
                move || async move {
                    let _permit = self.throttler.acquire().await;
                    tracker.set_waiting(kind, false);
                    self.config.retry.timed(self.fetch_once(unit)).await
                },
                |err, delay| {
                    if err.is_rate_limited() && self.throttler.pause_for(delay) {
                        tracker.set_waiting(kind, true);
                        log::warn!(target: LOG_TARGET, "Hit GitHub rate limit while fetching {label}, pausing requests for {}s", delay.as_secs());
                        if !log::log_enabled!(log::Level::Warn) {
                            tracker.println(&format!("GitHub rate limit exceeded: waiting {}s...", delay.as_secs()));
                        }
                    }
                },
            )
            .await
    }

    async fn fetch_once(&self, unit: &FetchUnit) -> core::result::Result<Vec<RawSignal>, FetchError> {
        match unit {
            FetchUnit::Trending(language) => self.fetcher.fetch_trending(language.as_deref(), self.config.trending_since).await,
            FetchUnit::Keyword(kw) => self.fetcher.fetch_keyword_matches(kw).await,
            FetchUnit::Watchlist(repo) => self.fetcher.fetch_watchlist_status(repo).await.map(|signal| vec![signal]),
        }
    }
}

/// Whether a record's name or description mentions one of the (lowercased) keywords.
fn mentions_any(record: &ProjectRecord, keywords: &[String]) -> bool {
    let text = format!(
        "{} {} {}",
        record.repo_id,
        record.display_name,
        record.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    keywords.iter().any(|kw| text.contains(kw.as_str()))
}
