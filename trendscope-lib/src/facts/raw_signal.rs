//! Raw, source-shaped signals as returned by a [`SourceFetcher`](super::SourceFetcher).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observation of a repository from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignal {
    pub fetched_at: DateTime<Utc>,
    pub payload: SignalPayload,
}

/// Source-specific shape of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPayload {
    Trending(TrendingEntry),
    Keyword(RepositoryPayload),
    Watchlist(WatchedRepository),
}

/// One row scraped from a trending page. Counts are kept as the text shown on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    /// Link target of the repository heading, e.g. `/owner/name`.
    pub repo_path: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars_text: String,
    pub forks_text: Option<String>,
    /// Count preceding "stars today" (or "this week"/"this month").
    pub gained_text: Option<String>,
}

/// Repository object as returned by the GitHub REST API.
///
/// Counts are signed so that nonsensical negative values can be detected and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: Option<i64>,
    pub forks_count: Option<i64>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub license: Option<LicensePayload>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

/// A watched repository plus the recent activity looked up alongside it.
///
/// The activity lists are best effort: `None` means that lookup failed or was not made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedRepository {
    pub repo: RepositoryPayload,
    #[serde(default)]
    pub recent_commits: Option<Vec<CommitPayload>>,
    #[serde(default)]
    pub contributors: Option<Vec<ContributorPayload>>,
}

impl From<RepositoryPayload> for WatchedRepository {
    fn from(repo: RepositoryPayload) -> Self {
        Self {
            repo,
            recent_commits: None,
            contributors: None,
        }
    }
}

/// Entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPayload {
    pub sha: Option<String>,
    #[serde(default)]
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: Option<String>,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Entry of `GET /repos/{owner}/{repo}/contributors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorPayload {
    pub login: Option<String>,
    pub contributions: Option<i64>,
}
