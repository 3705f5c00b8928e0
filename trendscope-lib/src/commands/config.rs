use crate::Result;
use crate::facts::{CollectorConfig, RepoId, RetryPolicy, TrendingWindow};
use crate::reports::ReportOptions;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "trendscope.toml";

const MAX_RESULTS_PER_KEYWORD: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Search terms for keyword search and the trending filter
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Repositories checked on every run, as `owner/name`
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<String>,

    /// Trending pages to scan; empty means the global page only
    #[serde(default = "default_trending_languages")]
    pub trending_languages: Vec<String>,

    #[serde(default)]
    pub trending_since: TrendingWindow,

    /// Language qualifiers appended to keyword searches
    #[serde(default = "default_search_languages")]
    pub search_languages: Vec<String>,

    #[serde(default = "default_results_per_keyword")]
    pub results_per_keyword: u8,

    #[serde(default = "default_true")]
    pub filter_trending_by_keywords: bool,

    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    #[serde(default)]
    pub serve_stale_on_failure: bool,

    /// Stars gained since the prior snapshot for a project to count as rising
    #[serde(default = "default_rising_threshold")]
    pub rising_threshold: u64,

    #[serde(default = "default_rate_limit_buffer")]
    pub rate_limit_buffer: u64,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_rate_limit_wait_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_rate_limit_wait_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReportConfig {
    pub top_n: usize,
    pub section_limit: usize,
    /// Daily reports older than this many days are deleted
    pub retention_days: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            section_limit: 15,
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GitHubConfig {
    pub api_base_url: String,
    pub web_base_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            web_base_url: "https://github.com".to_string(),
        }
    }
}

// The embedded defaults list every key, so parsing them never calls back into these.
fn default_keywords() -> Vec<String> {
    Config::default().keywords
}

fn default_watchlist() -> Vec<String> {
    Config::default().watchlist
}

fn default_trending_languages() -> Vec<String> {
    Config::default().trending_languages
}

fn default_search_languages() -> Vec<String> {
    vec!["python".to_string(), "typescript".to_string()]
}

const fn default_results_per_keyword() -> u8 {
    10
}

const fn default_true() -> bool {
    true
}

const fn default_cache_ttl_seconds() -> u64 {
    3600
}

const fn default_rising_threshold() -> u64 {
    50
}

const fn default_rate_limit_buffer() -> u64 {
    100
}

const fn default_max_concurrent_requests() -> usize {
    5
}

const fn default_request_timeout_seconds() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `trendscope.toml` in `base_dir` is used if it exists.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading trendscope configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading trendscope configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config
            .validate()
            .map_err(|e| e.enrich_with(|| format!("validating configuration file '{final_path}'")))?;

        Ok(config)
    }

    /// Write the default configuration to a new TOML file.
    ///
    /// An existing file is left alone and reported as an error.
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_path)
            .into_app_err_with(|| format!("creating configuration file '{output_path}'"))?;

        file.write_all(DEFAULT_CONFIG_TOML.as_bytes())
            .into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.keywords.iter().position(|kw| kw.trim().is_empty()) {
            bail!("keywords[{index}] is empty");
        }

        if let Some(index) = self.trending_languages.iter().position(|lang| lang.trim().is_empty()) {
            bail!("trending_languages[{index}] is empty");
        }

        let _ = self.watchlist_ids()?;

        if !(1..=MAX_RESULTS_PER_KEYWORD).contains(&self.results_per_keyword) {
            bail!(
                "results_per_keyword must be between 1 and {MAX_RESULTS_PER_KEYWORD}, got {}",
                self.results_per_keyword
            );
        }

        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be at least 1");
        }

        if self.request_timeout_seconds == 0 {
            bail!("request_timeout_seconds must be at least 1");
        }

        if self.run_timeout_seconds == Some(0) {
            bail!("run_timeout_seconds must be at least 1 when set");
        }

        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            bail!(
                "retry.base_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            );
        }

        if self.report.top_n == 0 {
            bail!("report.top_n must be at least 1");
        }

        if self.report.section_limit == 0 {
            bail!("report.section_limit must be at least 1");
        }

        if self.report.retention_days == 0 {
            bail!("report.retention_days must be at least 1");
        }

        let _ = self.api_base_url()?;
        let _ = self.web_base_url()?;

        Ok(())
    }

    /// Parse the watchlist, rejecting malformed and duplicate entries.
    pub fn watchlist_ids(&self) -> Result<Vec<RepoId>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(self.watchlist.len());

        for (index, entry) in self.watchlist.iter().enumerate() {
            let id = RepoId::parse(entry).map_err(|e| app_err!("watchlist[{index}]: {e}"))?;
            if !seen.insert(id.clone()) {
                bail!("watchlist[{index}]: '{}' is listed more than once", id);
            }
            ids.push(id);
        }

        Ok(ids)
    }

    pub fn api_base_url(&self) -> Result<Url> {
        parse_base_url("github.api_base_url", &self.github.api_base_url)
    }

    pub fn web_base_url(&self) -> Result<Url> {
        parse_base_url("github.web_base_url", &self.github.web_base_url)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_rate_limit_wait: Duration::from_secs(self.retry.max_rate_limit_wait_seconds),
            attempt_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }

    pub fn collector_config(&self) -> Result<CollectorConfig> {
        Ok(CollectorConfig {
            keywords: self.keywords.iter().map(|kw| kw.trim().to_string()).collect(),
            watchlist: self.watchlist_ids()?,
            trending_languages: self.trending_languages.iter().map(|lang| lang.trim().to_string()).collect(),
            trending_since: self.trending_since,
            filter_trending_by_keywords: self.filter_trending_by_keywords,
            serve_stale_on_failure: self.serve_stale_on_failure,
            cache_ttl: Duration::from_secs(self.cache_ttl_seconds),
            rate_limit_buffer: self.rate_limit_buffer,
            max_concurrent_requests: self.max_concurrent_requests,
            retry: self.retry_policy(),
        })
    }

    #[must_use]
    pub const fn report_options(&self, generated_at: DateTime<Utc>) -> ReportOptions {
        ReportOptions {
            section_limit: self.report.section_limit,
            top_n: self.report.top_n,
            generated_at,
        }
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }
}

fn parse_base_url(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).into_app_err_with(|| format!("{key} is not a valid URL: '{value}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{key} must be an http or https URL, got '{value}'");
    }
    Ok(url)
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.watchlist_ids().unwrap().len(), 26);
        assert_eq!(config.keywords.len(), 17);
        assert_eq!(config.trending_languages.len(), 6);
        assert_eq!(config.run_timeout(), None);
    }

    #[test]
    fn test_empty_config_takes_defaults() {
        let config = parse("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_tables_take_defaults() {
        let config = parse("[retry]\nmax_attempts = 5\n\n[report]\ntop_n = 3\n");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.report.top_n, 3);
        assert_eq!(config.report.section_limit, 15);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("unknown_field = 1").is_err());
        assert!(toml::from_str::<Config>("[retry]\nattempts = 1").is_err());
    }

    #[test]
    fn test_trending_since_parses() {
        assert_eq!(parse("trending_since = \"weekly\"").trending_since, TrendingWindow::Weekly);
        assert!(toml::from_str::<Config>("trending_since = \"hourly\"").is_err());
    }

    #[test]
    fn test_watchlist_entries_are_trimmed() {
        let config = parse("watchlist = [\" StabilityAI/StableDiffusion\"]");
        config.validate().unwrap();
        assert_eq!(config.watchlist_ids().unwrap()[0].as_str(), "StabilityAI/StableDiffusion");
    }

    #[test]
    fn test_duplicate_watchlist_rejected() {
        let config = parse("watchlist = [\"owner/repo\", \"Owner/Repo\"]");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn test_malformed_watchlist_rejected() {
        let config = parse("watchlist = [\"not-a-repo\"]");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watchlist[0]"), "{err}");
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let config = parse("keywords = [\"llm\", \"  \"]");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keywords[1]"), "{err}");
    }

    #[test]
    fn test_numeric_bounds() {
        for text in [
            "results_per_keyword = 0",
            "results_per_keyword = 101",
            "max_concurrent_requests = 0",
            "request_timeout_seconds = 0",
            "run_timeout_seconds = 0",
            "[retry]\nmax_attempts = 0",
            "[retry]\nbase_delay_ms = 5000\nmax_delay_ms = 100",
            "[report]\ntop_n = 0",
            "[report]\nsection_limit = 0",
            "[report]\nretention_days = 0",
        ] {
            assert!(parse(text).validate().is_err(), "expected '{text}' to be rejected");
        }
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(parse("[github]\napi_base_url = \"not a url\"").validate().is_err());
        assert!(parse("[github]\nweb_base_url = \"ftp://example.com\"").validate().is_err());
    }

    #[test]
    fn test_collector_config_conversion() {
        let config = parse(
            "keywords = [\" llm \"]\nwatchlist = [\"a/b\"]\ntrending_languages = []\ncache_ttl_seconds = 60\nrequest_timeout_seconds = 7\n",
        );
        let collector = config.collector_config().unwrap();
        assert_eq!(collector.keywords, vec!["llm".to_string()]);
        assert_eq!(collector.watchlist.len(), 1);
        assert!(collector.trending_languages.is_empty());
        assert_eq!(collector.cache_ttl, Duration::from_secs(60));
        assert_eq!(collector.retry.attempt_timeout, Duration::from_secs(7));
        assert_eq!(collector.retry.max_delay, Duration::from_secs(30));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let output_path = Utf8PathBuf::try_from(tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        Config::save_default(&output_path).unwrap();

        let base_dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let loaded = Config::load(&base_dir, None).unwrap();
        assert_eq!(loaded, Config::default());

        assert!(Config::save_default(&output_path).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let base_dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(Config::load(&base_dir, None).unwrap(), Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_explicit_missing_path_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let base_dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let missing = base_dir.join("missing.toml");
        assert!(Config::load(&base_dir, Some(&missing)).is_err());
    }
}
