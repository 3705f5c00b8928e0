use super::{RepoId, SourceTag};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Canonical state of one tracked repository.
///
/// Descriptive fields come from the signal named by `described_by`, fetched at
/// `fetched_at`. Counters only ever grow when records are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub repo_id: RepoId,
    pub display_name: String,
    pub description: Option<String>,
    pub primary_language: Option<String>,
    pub url: String,
    pub star_count: u64,
    pub stars_gained_in_window: u64,
    #[serde(default)]
    pub forks: Option<u64>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub sources: BTreeSet<SourceTag>,
    pub matched_keywords: BTreeSet<String>,
    pub first_seen_date: NaiveDate,
    pub last_seen_date: NaiveDate,
    pub fetched_at: DateTime<Utc>,
    pub described_by: SourceTag,
    /// Only gathered for watched repositories.
    #[serde(default)]
    pub activity: Option<RepoActivity>,
}

/// Recent commits and top contributors of a repository, as of `fetched_at`.
///
/// Ordered by `fetched_at` first, so keeping the greater of two activities keeps the newer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoActivity {
    pub fetched_at: DateTime<Utc>,
    pub recent_commits: Vec<RecentCommit>,
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecentCommit {
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    pub author: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

impl ProjectRecord {
    #[must_use]
    pub fn has_source_kind(&self, kind: super::SourceKind) -> bool {
        self.sources.iter().any(|tag| tag.kind() == kind)
    }

    #[must_use]
    pub fn is_watchlisted(&self) -> bool {
        self.sources.contains(&SourceTag::Watchlist)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a record with sensible defaults for tests.
    pub fn record(repo: &str, tag: SourceTag, stars: u64) -> ProjectRecord {
        let repo_id = RepoId::parse(repo).unwrap();
        let run_date = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        ProjectRecord {
            display_name: repo_id.name().to_string(),
            url: format!("https://github.com/{repo_id}"),
            repo_id,
            description: None,
            primary_language: None,
            star_count: stars,
            stars_gained_in_window: 0,
            forks: None,
            topics: Vec::new(),
            license: None,
            updated_at: None,
            matched_keywords: tag.keyword().map(str::to_string).into_iter().collect(),
            sources: BTreeSet::from([tag.clone()]),
            first_seen_date: run_date,
            last_seen_date: run_date,
            fetched_at: DateTime::from_timestamp(1_771_977_600, 0).unwrap(),
            described_by: tag,
            activity: None,
        }
    }
}
