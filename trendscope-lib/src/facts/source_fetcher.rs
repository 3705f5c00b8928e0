use super::{FetchError, RawSignal, RepoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

/// Time window of a trending listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TrendingWindow {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TrendingWindow {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Latest observed API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Source of raw project signals.
///
/// Implementations perform a single attempt per call. Retries, caching and throttling
/// are layered on top by the collector.
pub trait SourceFetcher: Send + Sync {
    /// Repositories on the trending page, optionally restricted to one language.
    fn fetch_trending(
        &self,
        language: Option<&str>,
        since: TrendingWindow,
    ) -> impl Future<Output = Result<Vec<RawSignal>, FetchError>> + Send;

    /// Repositories matching a search keyword.
    fn fetch_keyword_matches(&self, keyword: &str) -> impl Future<Output = Result<Vec<RawSignal>, FetchError>> + Send;

    /// Current state of one watched repository.
    fn fetch_watchlist_status(&self, repo_id: &RepoId) -> impl Future<Output = Result<RawSignal, FetchError>> + Send;

    /// The most recent quota observation, if the source tracks one.
    fn quota(&self) -> Option<RateLimitInfo> {
        None
    }
}
