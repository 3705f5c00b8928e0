use crate::Result;
use crate::diff::DiffEntry;
use crate::pipeline::RunOutcome;
use core::fmt::Write;
use serde_json::json;

/// Write the run's diff summary and diagnostics as JSON.
pub fn generate<W: Write>(outcome: &RunOutcome, writer: &mut W) -> Result<()> {
    let output = json!({
        "run_date": outcome.snapshot.run_date,
        "prior_date": outcome.prior.as_ref().map(|p| p.run_date),
        "tracked_projects": outcome.snapshot.len(),
        "total_stars": outcome.snapshot.total_stars(),
        "new_projects": entries(&outcome.diff.new_projects),
        "rising_projects": entries(&outcome.diff.rising_projects),
        "watchlist_changes": entries(&outcome.diff.watchlist_changes),
        "diagnostics": outcome.diagnostics,
    });

    writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn entries(list: &[DiffEntry]) -> Vec<serde_json::Value> {
    list.iter()
        .map(|entry| {
            let r = &entry.record;
            json!({
                "repo_id": r.repo_id,
                "url": r.url,
                "description": r.description,
                "primary_language": r.primary_language,
                "star_count": r.star_count,
                "stars_gained_in_window": r.stars_gained_in_window,
                "prior_star_count": entry.prior_stars,
                "star_delta": entry.star_delta().map(|d| d.to_string()),
                "sources": r.sources,
            })
        })
        .collect()
}
