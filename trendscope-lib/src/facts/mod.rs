//! Gathering of project signals and their reduction to project records.
//!
//! Raw signals come from a [`SourceFetcher`], which performs single attempts against one
//! platform. The [`Collector`] runs every configured fetch unit (trending listings,
//! keyword searches, watched repositories) concurrently, layering a TTL cache, a shared
//! throttle that honors rate limits, and retries with backoff on top of the fetcher.
//!
//! Each signal is turned into a [`ProjectRecord`] by [`normalize`], and records that
//! describe the same repository are combined by [`merge`]. Merging is commutative and
//! associative, so the order in which sources answer never changes the result.

mod cache;
mod collector;
mod fetch_error;
mod github;
mod merger;
mod normalizer;
mod path_utils;
mod progress;
mod project_record;
#[cfg(any(debug_assertions, test))]
pub mod raw_signal;
#[cfg(not(any(debug_assertions, test)))]
pub(crate) mod raw_signal;
mod repo_id;
mod request_tracker;
mod retry_policy;
mod signal_cache;
mod source_fetcher;
mod source_tag;
mod throttler;

pub use cache::Cache;
pub use collector::{Collection, Collector, CollectorConfig, RunDiagnostics, SourceStats};
pub use fetch_error::FetchError;
pub use github::{GitHubFetcher, parse_trending_page};
pub use merger::{merge, merge_into};
pub use normalizer::{MalformedSignal, normalize, parse_count};
pub use path_utils::{sanitize_path_component, unique_path_component};
pub use progress::{Progress, SilentProgress};
pub use project_record::{Contributor, ProjectRecord, RecentCommit, RepoActivity};
pub use raw_signal::RawSignal;
pub use repo_id::RepoId;
pub use retry_policy::RetryPolicy;
pub use source_fetcher::{RateLimitInfo, SourceFetcher, TrendingWindow};
pub use source_tag::{SourceKind, SourceTag};

#[cfg(test)]
pub(crate) use project_record::test_support;
