//! Single-flight, TTL-aware caching of raw source signals.

use super::cache::{Cache, CacheResult};
use super::{FetchError, RawSignal};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

const LOG_TARGET: &str = "     cache";

/// Where a cache lookup's signals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fetched from the source during this run.
    Live,
    /// Served from a fresh cache entry.
    Cached,
}

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub signals: Arc<Vec<RawSignal>>,
    pub origin: Origin,
}

type Outcome = Result<CacheHit, FetchError>;

/// Caches fetched signals per key and collapses concurrent lookups of one key.
///
/// The first caller for a key performs the lookup-or-fetch; every later caller in the
/// same run receives that outcome, including failures. Failures are never written to disk,
/// so the next run starts clean.
#[derive(Debug)]
pub struct SignalCache {
    cache: Cache,
    ttl: Duration,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Outcome>>>>,
}

impl SignalCache {
    #[must_use]
    pub fn new(cache: Cache, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Return cached signals for `key` when fresh, otherwise run `fetch` and store its result.
    pub async fn get<F, Fut>(&self, key: &str, fetch: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawSignal>, FetchError>>,
    {
        let cell = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(key.to_string()).or_default())
        };

        cell.get_or_init(|| self.lookup_or_fetch(key, fetch)).await.clone()
    }

    /// Read an entry regardless of age, for callers that prefer old data over none.
    #[must_use]
    pub fn load_stale(&self, key: &str) -> Option<(Vec<RawSignal>, DateTime<Utc>)> {
        self.cache.load_stale(key)
    }

    async fn lookup_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawSignal>, FetchError>>,
    {
        if let CacheResult::Fresh(signals) = self.cache.load::<Vec<RawSignal>>(key, self.ttl) {
            return Ok(CacheHit {
                signals: Arc::new(signals),
                origin: Origin::Cached,
            });
        }

        let signals = fetch().await?;

        if let Err(e) = self.cache.save(key, &signals) {
            log::warn!(target: LOG_TARGET, "Could not save cache entry '{key}': {e:#}");
        }

        Ok(CacheHit {
            signals: Arc::new(signals),
            origin: Origin::Live,
        })
    }
}
