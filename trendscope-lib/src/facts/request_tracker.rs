//! Per-source fetch counters feeding the progress bar.

use super::SourceKind;
use super::progress::Progress;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Display order of the sources in the progress message.
const KINDS: [SourceKind; 3] = [SourceKind::Trending, SourceKind::Keyword, SourceKind::Watchlist];

const fn slot(kind: SourceKind) -> usize {
    match kind {
        SourceKind::Trending => 0,
        SourceKind::Keyword => 1,
        SourceKind::Watchlist => 2,
    }
}

const fn label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Trending => "trending",
        SourceKind::Keyword => "keywords",
        SourceKind::Watchlist => "watchlist",
    }
}

#[derive(Debug, Default)]
struct SourceCounter {
    planned: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    waiting: AtomicBool,
}

impl SourceCounter {
    fn render(&self, kind: SourceKind, use_colors: bool) -> Option<(u64, u64, String)> {
        let planned = self.planned.load(Ordering::Relaxed);
        if planned == 0 {
            return None;
        }

        let finished = self.finished.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);

        let mut text = format!("{finished}/{planned} {}", label(kind));
        if failed > 0 {
            let note = format!(" ({failed} failed)");
            if use_colors {
                text.push_str(&note.red().to_string());
            } else {
                text.push_str(&note);
            }
        }

        let text = if finished >= planned && use_colors {
            text.green().to_string()
        } else if self.waiting.load(Ordering::Relaxed) {
            let text = format!("{text} waiting");
            if use_colors { text.yellow().to_string() } else { text }
        } else {
            text
        };

        Some((planned, finished, text))
    }
}

/// Counts fetch units per source kind and drives a determinate progress display.
#[derive(Clone)]
pub struct RequestTracker {
    counters: Arc<[SourceCounter; 3]>,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl RequestTracker {
    /// Install a determinate status callback on `progress` backed by fresh counters.
    #[must_use]
    pub fn new(progress: &Arc<dyn Progress>) -> Self {
        let counters: Arc<[SourceCounter; 3]> = Arc::default();

        let shared = Arc::clone(&counters);
        let use_colors = progress.use_colors();
        progress.set_determinate(Box::new(move || summarize(&shared, use_colors)));

        Self {
            counters,
            progress: Arc::clone(progress),
        }
    }

    pub fn println(&self, msg: &str) {
        self.progress.println(msg);
    }

    /// Announce one more unit of `kind` that will be fetched.
    pub fn plan(&self, kind: SourceKind) {
        let _ = self.counters[slot(kind)].planned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a unit of `kind` is done, successfully or not.
    pub fn finish(&self, kind: SourceKind, succeeded: bool) {
        let counter = &self.counters[slot(kind)];
        if !succeeded {
            let _ = counter.failed.fetch_add(1, Ordering::Relaxed);
        }
        let _ = counter.finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Flag `kind` as held back by a rate limit until its next attempt starts.
    pub fn set_waiting(&self, kind: SourceKind, waiting: bool) {
        self.counters[slot(kind)].waiting.store(waiting, Ordering::Relaxed);
    }
}

/// Returns (`planned`, `finished`, `message`) across all source kinds.
fn summarize(counters: &[SourceCounter; 3], use_colors: bool) -> (u64, u64, String) {
    let mut planned = 0;
    let mut finished = 0;
    let mut parts = Vec::new();

    for kind in KINDS {
        if let Some((p, f, text)) = counters[slot(kind)].render(kind, use_colors) {
            planned += p;
            finished += f;
            parts.push(text);
        }
    }

    if parts.is_empty() {
        (0, 0, "nothing to fetch".to_string())
    } else {
        (planned, finished, parts.join(", "))
    }
}
