//! Minimal GitHub HTTP client.
//!
//! Sends single GET requests, classifies the response status into [`FetchError`] kinds
//! and remembers the most recent core API quota seen in response headers.

use crate::facts::{FetchError, RateLimitInfo};
use chrono::{DateTime, Utc};
use ohno::app_err;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, PoisonError};

const LOG_TARGET: &str = "    github";

/// Assumed wait when a rate-limit response carries no reset information.
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 3600;

#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    quota: Mutex<Option<RateLimitInfo>>,
}

impl Client {
    /// Create a client with an optional authentication token.
    pub fn new(token: Option<&str>) -> crate::Result<Self> {
        use reqwest::header::{AUTHORIZATION, HeaderValue};

        let mut builder = reqwest::Client::builder().user_agent("trendscope");

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);

            let mut headers = HeaderMap::new();
            let _ = headers.insert(AUTHORIZATION, auth_val);

            builder = builder.default_headers(headers);
        }

        Ok(Self {
            http: builder.build()?,
            quota: Mutex::new(None),
        })
    }

    /// The most recent core API quota seen in a response.
    #[must_use]
    pub fn quota(&self) -> Option<RateLimitInfo> {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.send(url, "application/vnd.github+json").await?;
        resp.json()
            .await
            .map_err(|e| FetchError::network(app_err!("decoding response from '{url}': {e}")))
    }

    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.send(url, "text/html").await?;
        resp.text()
            .await
            .map_err(|e| FetchError::network(app_err!("reading response from '{url}': {e}")))
    }

    async fn send(&self, url: &str, accept: &'static str) -> Result<reqwest::Response, FetchError> {
        log::debug!(target: LOG_TARGET, "GET {url}");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FetchError::network(app_err!("requesting '{url}': {e}")))?;

        self.record_quota(resp.headers());

        match classify(resp.status(), resp.headers(), url, Utc::now()) {
            None => Ok(resp),
            Some(err) => {
                log::debug!(target: LOG_TARGET, "GET {url} failed with HTTP {}: {err}", resp.status().as_u16());
                Err(err)
            }
        }
    }

    fn record_quota(&self, headers: &HeaderMap) {
        // Search has its own, much smaller, per-minute budget
        let resource = header_str(headers, "x-ratelimit-resource").unwrap_or("core");
        if resource != "core" {
            return;
        }

        let Some(observed) = extract_rate_limit_from_headers(headers) else {
            return;
        };

        let mut quota = self.quota.lock().unwrap_or_else(PoisonError::into_inner);
        let replace = quota.is_none_or(|current| {
            observed.reset_at > current.reset_at || (observed.reset_at == current.reset_at && observed.remaining < current.remaining)
        });
        if replace {
            *quota = Some(observed);
        }
    }
}

/// Map a response status to a fetch error, or `None` for success.
pub fn classify(status: StatusCode, headers: &HeaderMap, url: &str, now: DateTime<Utc>) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let rate_limited = || FetchError::RateLimited {
        reset_at: Some(rate_limit_reset(headers, now)),
    };

    Some(match status {
        StatusCode::UNAUTHORIZED => FetchError::auth(app_err!("HTTP 401 from '{url}': bad or missing credentials")),
        StatusCode::FORBIDDEN => {
            let exhausted = header_str(headers, "x-ratelimit-remaining").is_some_and(|v| v.trim() == "0");
            if exhausted || headers.contains_key(RETRY_AFTER) {
                rate_limited()
            } else {
                FetchError::auth(app_err!("HTTP 403 from '{url}': access denied"))
            }
        }
        StatusCode::TOO_MANY_REQUESTS => rate_limited(),
        StatusCode::NOT_FOUND => FetchError::NotFound(url.to_string()),
        _ => FetchError::network(app_err!("HTTP {} from '{url}'", status.as_u16())),
    })
}

/// When a rate limit lifts: `Retry-After` seconds, else `x-ratelimit-reset`, else one hour.
fn rate_limit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(secs) = header_str(headers, RETRY_AFTER.as_str()).and_then(|v| v.trim().parse::<i64>().ok()) {
        return now + chrono::Duration::seconds(secs.max(0));
    }

    header_str(headers, "x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| now + chrono::Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS))
}

fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = header_str(headers, "x-ratelimit-remaining")?.trim().parse::<u64>().ok()?;
    let reset_timestamp = header_str(headers, "x-ratelimit-reset")?.trim().parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
