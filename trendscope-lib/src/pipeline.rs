//! One tracking run: fetch, merge, stamp lifecycle dates, persist, diff.

use crate::Result;
use crate::diff::{DiffSummary, diff};
use crate::facts::{Collector, RunDiagnostics, SourceFetcher, merge};
use crate::history::{HistoryStore, Snapshot};
use chrono::NaiveDate;
use core::time::Duration;
use ohno::IntoAppError;

const LOG_TARGET: &str = "  pipeline";

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub prior: Option<Snapshot>,
    pub diff: DiffSummary,
    pub diagnostics: RunDiagnostics,
}

/// Run the pipeline for `run_date`.
///
/// Collection is bounded by `run_timeout`. A timed out run returns an error before anything
/// is written, so the store holds either the complete snapshot for `run_date` or whatever it
/// held before.
pub async fn run_pipeline<F: SourceFetcher>(
    collector: &Collector<F>,
    store: &HistoryStore,
    run_date: NaiveDate,
    rising_threshold: u64,
    run_timeout: Option<Duration>,
) -> Result<RunOutcome> {
    let collection = match run_timeout {
        Some(limit) => tokio::time::timeout(limit, collector.collect(run_date))
            .await
            .into_app_err_with(|| format!("run for {run_date} timed out after {}s, nothing was written", limit.as_secs()))?,
        None => collector.collect(run_date).await,
    };

    let progress = collector.progress();
    progress.set_phase("Persisting");
    progress.set_indeterminate(Box::new(move || format!("writing snapshot for {run_date}")));

    let merged = merge(collection.records);
    let prior = store.read_latest_before(run_date);
    match &prior {
        Some(p) => log::info!(target: LOG_TARGET, "Comparing against snapshot from {} ({} projects)", p.run_date, p.len()),
        None => log::info!(target: LOG_TARGET, "No snapshot before {run_date}, every project is new"),
    }

    let first_seen = store.first_seen();
    log::debug!(target: LOG_TARGET, "{} project(s) already in the archive", first_seen.len());

    let snapshot = Snapshot::stamped(run_date, merged, &first_seen);
    store.write(&snapshot)?;

    let diff = diff(&snapshot, prior.as_ref(), rising_threshold);
    log::info!(
        target: LOG_TARGET,
        "{} project(s) tracked: {} new, {} rising, {} watchlist change(s)",
        snapshot.len(),
        diff.new_projects.len(),
        diff.rising_projects.len(),
        diff.watchlist_changes.len()
    );

    Ok(RunOutcome {
        snapshot,
        prior,
        diff,
        diagnostics: collection.diagnostics,
    })
}
