use super::client::Client;
use super::trending::parse_trending_page;
use crate::facts::raw_signal::{CommitPayload, ContributorPayload, RepositoryPayload, SignalPayload, WatchedRepository};
use crate::facts::{FetchError, RateLimitInfo, RawSignal, RepoId, SourceFetcher, TrendingWindow};
use chrono::{DateTime, Utc};
use ohno::app_err;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

const LOG_TARGET: &str = "    github";

/// How many recent commits and top contributors to look up for each watched repository.
const ACTIVITY_LIMIT: &str = "5";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitResource,
}

#[derive(Debug, Deserialize)]
struct RateLimitResource {
    remaining: u64,
    reset: i64,
}

/// [`SourceFetcher`] backed by the GitHub REST API and the github.com trending page.
#[derive(Debug)]
pub struct GitHubFetcher {
    client: Client,
    api_base_url: Url,
    web_base_url: Url,
    search_languages: Vec<String>,
    results_per_keyword: u8,
}

impl GitHubFetcher {
    pub fn new(
        token: Option<&str>,
        api_base_url: Url,
        web_base_url: Url,
        search_languages: Vec<String>,
        results_per_keyword: u8,
    ) -> crate::Result<Self> {
        Ok(Self {
            client: Client::new(token)?,
            api_base_url,
            web_base_url,
            search_languages,
            results_per_keyword,
        })
    }

    /// Query the remaining core API quota.
    pub async fn rate_limit_status(&self) -> Result<RateLimitInfo, FetchError> {
        let url = endpoint(&self.api_base_url, &["rate_limit"])?;
        let resp: RateLimitResponse = self.client.get_json(url.as_str()).await?;

        let reset_at = DateTime::from_timestamp(resp.resources.core.reset, 0)
            .ok_or_else(|| FetchError::network(app_err!("invalid rate limit reset time {}", resp.resources.core.reset)))?;

        Ok(RateLimitInfo {
            remaining: resp.resources.core.remaining,
            reset_at,
        })
    }

    /// Best-effort lookup of `/repos/{owner}/{name}/{list}`. Failures only lose the list.
    async fn activity<T: DeserializeOwned>(&self, repo_id: &RepoId, list: &str) -> Option<Vec<T>> {
        let result = match endpoint(&self.api_base_url, &["repos", repo_id.owner(), repo_id.name(), list]) {
            Ok(mut url) => {
                let _ = url.query_pairs_mut().append_pair("per_page", ACTIVITY_LIMIT);
                self.client.get_json::<Vec<T>>(url.as_str()).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(entries) => Some(entries),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not look up {list} of watched repository '{repo_id}': {e}");
                None
            }
        }
    }

    fn search_query(&self, keyword: &str) -> String {
        let qualifiers = self
            .search_languages
            .iter()
            .map(|lang| format!("language:{}", lang.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" OR ");

        if qualifiers.is_empty() {
            keyword.to_string()
        } else {
            format!("{keyword} {qualifiers}")
        }
    }
}

impl SourceFetcher for GitHubFetcher {
    async fn fetch_trending(&self, language: Option<&str>, since: TrendingWindow) -> Result<Vec<RawSignal>, FetchError> {
        let mut url = match language {
            Some(lang) => endpoint(&self.web_base_url, &["trending", &language_slug(lang)])?,
            None => endpoint(&self.web_base_url, &["trending"])?,
        };
        let _ = url.query_pairs_mut().append_pair("since", since.as_str());

        log::info!(target: LOG_TARGET, "Querying GitHub for {} trending repositories ({})", language.unwrap_or("all"), since.as_str());

        let html = self.client.get_text(url.as_str()).await?;
        let fetched_at = Utc::now();

        let signals: Vec<_> = parse_trending_page(&html)
            .into_iter()
            .map(|entry| RawSignal {
                fetched_at,
                payload: SignalPayload::Trending(entry),
            })
            .collect();

        if signals.is_empty() {
            log::warn!(target: LOG_TARGET, "No repositories found on trending page '{url}', the page layout may have changed");
        }

        Ok(signals)
    }

    async fn fetch_keyword_matches(&self, keyword: &str) -> Result<Vec<RawSignal>, FetchError> {
        let mut url = endpoint(&self.api_base_url, &["search", "repositories"])?;
        let _ = url
            .query_pairs_mut()
            .append_pair("q", &self.search_query(keyword))
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &self.results_per_keyword.to_string());

        log::info!(target: LOG_TARGET, "Searching GitHub for repositories matching '{keyword}'");

        let resp: SearchResponse = self.client.get_json(url.as_str()).await?;
        let fetched_at = Utc::now();

        Ok(resp
            .items
            .into_iter()
            .map(|item| RawSignal {
                fetched_at,
                payload: SignalPayload::Keyword(item),
            })
            .collect())
    }

    async fn fetch_watchlist_status(&self, repo_id: &RepoId) -> Result<RawSignal, FetchError> {
        let url = endpoint(&self.api_base_url, &["repos", repo_id.owner(), repo_id.name()])?;

        log::info!(target: LOG_TARGET, "Querying GitHub for watched repository '{repo_id}'");

        let repo: RepositoryPayload = self.client.get_json(url.as_str()).await.map_err(|e| match e {
            FetchError::NotFound(_) => FetchError::NotFound(format!("repository '{repo_id}'")),
            other => other,
        })?;

        let (recent_commits, contributors) = tokio::join!(
            self.activity::<CommitPayload>(repo_id, "commits"),
            self.activity::<ContributorPayload>(repo_id, "contributors"),
        );

        Ok(RawSignal {
            fetched_at: Utc::now(),
            payload: SignalPayload::Watchlist(WatchedRepository {
                repo,
                recent_commits,
                contributors,
            }),
        })
    }

    fn quota(&self) -> Option<RateLimitInfo> {
        self.client.quota()
    }
}

/// Append path segments to a base URL, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = base.clone();
    let _ = url
        .path_segments_mut()
        .map_err(|()| FetchError::network(app_err!("'{base}' cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// GitHub's URL form of a language name: lowercase, spaces as dashes.
fn language_slug(language: &str) -> String {
    language.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}
