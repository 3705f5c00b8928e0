//! A directory-backed JSON cache with TTL-aware loading.
//!
//! Every entry is wrapped in an envelope recording when it was written. Freshness is
//! decided at load time against a caller-supplied TTL, so one cache directory can serve
//! sources with different freshness needs.

use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     cache";

/// Result of loading an entry from the cache.
#[derive(Debug, Clone)]
pub enum CacheResult<T> {
    /// Entry found and younger than the TTL.
    Fresh(T),

    /// Entry found but at least TTL old.
    Stale(T),

    /// No usable entry (absent, corrupt, or the cache is being ignored).
    Miss,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Envelope<T> {
    timestamp: DateTime<Utc>,
    payload: T,
}

/// A TTL-aware, directory-backed JSON cache.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    now: DateTime<Utc>,
    ignore: bool,
}

impl Cache {
    /// Create a cache rooted at `cache_dir`.
    ///
    /// `now` is the reference time for both freshness checks and new entries. With
    /// `ignore_cache` set, [`load`](Self::load) always misses but saves still happen.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, now: DateTime<Utc>, ignore_cache: bool) -> Self {
        Self {
            dir: cache_dir.into(),
            now,
            ignore: ignore_cache,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Load an entry by filename (relative to the cache directory).
    ///
    /// An entry exactly `ttl` old is stale. A timestamp in the future counts as fresh.
    #[must_use]
    pub fn load<T>(&self, filename: &str, ttl: Duration) -> CacheResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        if self.ignore {
            return CacheResult::Miss;
        }

        let Some(envelope) = self.read_envelope::<T>(filename) else {
            return CacheResult::Miss;
        };

        let age = self.now.signed_duration_since(envelope.timestamp);
        if age.num_milliseconds() < 0 {
            log::debug!(target: LOG_TARGET, "Cache timestamp is in the future for {filename} (clock skew detected), treating as fresh");
            return CacheResult::Fresh(envelope.payload);
        }

        let age = age.to_std().unwrap_or(Duration::MAX);
        if age >= ttl {
            log::debug!(
                target: LOG_TARGET,
                "Cache expired for {filename} (age: {}s, TTL: {}s)",
                age.as_secs(),
                ttl.as_secs()
            );
            return CacheResult::Stale(envelope.payload);
        }

        log::debug!(target: LOG_TARGET, "Cache hit for {filename} (age: {}s)", age.as_secs());
        CacheResult::Fresh(envelope.payload)
    }

    /// Load an entry regardless of its age or the ignore flag.
    #[must_use]
    pub fn load_stale<T>(&self, filename: &str) -> Option<(T, DateTime<Utc>)>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.read_envelope::<T>(filename).map(|e| (e.payload, e.timestamp))
    }

    /// Save data under the given filename, stamped with this cache's `now`.
    pub fn save<T>(&self, filename: &str, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        let envelope = Envelope {
            timestamp: self.now,
            payload: data,
        };

        let path = self.dir.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;
        }

        let file = File::create(&path).into_app_err_with(|| format!("creating cache file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, &envelope);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, &envelope);

        result.into_app_err_with(|| format!("writing cache file '{}'", path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing cache file '{}'", path.display()))?;
        Ok(())
    }

    fn read_envelope<T>(&self, filename: &str) -> Option<Envelope<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = self.dir.join(filename);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Cache miss for {filename}: {e:#}");
                return None;
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Ignoring unreadable cache entry {filename}: {e:#}");
                None
            }
        }
    }
}
