use super::common::format_count;
use crate::Result;
use crate::facts::{RunDiagnostics, SourceKind, SourceStats};
use crate::pipeline::RunOutcome;
use core::fmt::Write;
use owo_colors::OwoColorize;
use strum::IntoEnumIterator;

/// Write the end-of-run summary: what was tracked, what changed, and how well each source did.
pub fn generate<W: Write>(outcome: &RunOutcome, use_colors: bool, writer: &mut W) -> Result<()> {
    let snapshot = &outcome.snapshot;
    let diff = &outcome.diff;

    let headline = format!("Tracked {} project(s) for {}", snapshot.len(), snapshot.run_date);
    if use_colors {
        writeln!(writer, "{}", headline.bold())?;
    } else {
        writeln!(writer, "{headline}")?;
    }

    writeln!(
        writer,
        "  {} new, {} rising, {} watchlist change(s)",
        diff.new_projects.len(),
        diff.rising_projects.len(),
        diff.watchlist_changes.len()
    )?;

    match &outcome.prior {
        Some(prior) => writeln!(writer, "  compared against {}", prior.run_date)?,
        None => writeln!(writer, "  no earlier snapshot, every project counts as new")?,
    }

    writeln!(writer)?;
    write_sources(&outcome.diagnostics, use_colors, writer)
}

/// Per-source coverage table followed by record-level counts and the API quota.
pub fn write_sources<W: Write>(diagnostics: &RunDiagnostics, use_colors: bool, writer: &mut W) -> Result<()> {
    writeln!(writer, "{:<10} {:>6} {:>8} {:>7} {:>7}", "Source", "Units", "Fetched", "Cached", "Failed")?;

    for kind in SourceKind::iter() {
        let stats = diagnostics.source(kind);
        let name: &'static str = kind.into();
        write!(
            writer,
            "{:<10} {:>6} {:>8} {:>7} ",
            name, stats.units, stats.fetched, stats.cached
        )?;

        let failed = format!("{:>7}", stats.failed);
        if use_colors && stats.failed > 0 {
            write!(writer, "{}", failed.red())?;
        } else {
            write!(writer, "{failed}")?;
        }

        let note = coverage_note(stats);
        if note.is_empty() {
            writeln!(writer)?;
        } else if use_colors {
            writeln!(writer, "  {}", note.yellow())?;
        } else {
            writeln!(writer, "  {note}")?;
        }
    }

    writeln!(writer)?;

    if diagnostics.skipped_malformed > 0 {
        writeln!(writer, "Skipped {} malformed signal(s)", diagnostics.skipped_malformed)?;
    }

    if diagnostics.filtered_out > 0 {
        writeln!(writer, "Filtered out {} trending project(s) without a keyword match", diagnostics.filtered_out)?;
    }

    if let Some(quota) = diagnostics.quota {
        writeln!(
            writer,
            "GitHub API quota: {} request(s) remaining, resets at {}",
            format_count(quota.remaining),
            quota.reset_at.format("%H:%M UTC")
        )?;
    }

    Ok(())
}

fn coverage_note(stats: &SourceStats) -> String {
    let mut notes = Vec::new();
    if stats.stale > 0 {
        notes.push(format!("{} served stale", stats.stale));
    }
    if stats.auth_failures > 0 {
        notes.push(format!("reduced coverage: {} authentication failure(s)", stats.auth_failures));
    }
    notes.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::facts::test_support::record;
    use crate::facts::{RateLimitInfo, SourceTag, merge};
    use crate::history::Snapshot;
    use chrono::{DateTime, NaiveDate};

    fn outcome(diagnostics: RunDiagnostics) -> RunOutcome {
        let snapshot = Snapshot::new(
            NaiveDate::from_ymd_opt(2026, 2, 25).unwrap(),
            merge([record("a/b", SourceTag::Trending, 1500), record("c/d", SourceTag::Watchlist, 10)]),
        );
        let diff = diff(&snapshot, None, 50);
        RunOutcome {
            snapshot,
            prior: None,
            diff,
            diagnostics,
        }
    }

    #[test]
    fn test_summary_without_colors() {
        let diagnostics = RunDiagnostics {
            trending: SourceStats { units: 2, fetched: 1, cached: 1, ..SourceStats::default() },
            keyword: SourceStats { units: 3, fetched: 1, failed: 2, auth_failures: 2, ..SourceStats::default() },
            watchlist: SourceStats { units: 1, cached: 1, stale: 1, ..SourceStats::default() },
            skipped_malformed: 1,
            filtered_out: 4,
            quota: Some(RateLimitInfo {
                remaining: 4321,
                reset_at: DateTime::from_timestamp(1_771_981_200, 0).unwrap(),
            }),
        };

        let mut output = String::new();
        generate(&outcome(diagnostics), false, &mut output).unwrap();

        assert!(output.starts_with("Tracked 2 project(s) for 2026-02-25\n"));
        assert!(output.contains("  2 new, 0 rising, 0 watchlist change(s)"));
        assert!(output.contains("no earlier snapshot"));
        assert!(output.contains("keyword         3        1       0       2  reduced coverage: 2 authentication failure(s)"));
        assert!(output.contains("watchlist       1        0       1       0  1 served stale"));
        assert!(output.contains("trending        2        1       1       0\n"));
        assert!(output.contains("Skipped 1 malformed signal(s)"));
        assert!(output.contains("Filtered out 4 trending project(s)"));
        assert!(output.contains("GitHub API quota: 4,321 request(s) remaining, resets at 01:00 UTC"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_quiet_run_omits_optional_lines() {
        let mut output = String::new();
        generate(&outcome(RunDiagnostics::default()), false, &mut output).unwrap();

        assert!(!output.contains("Skipped"));
        assert!(!output.contains("Filtered"));
        assert!(!output.contains("quota"));
    }

    #[test]
    fn test_colors_applied_to_failures() {
        let diagnostics = RunDiagnostics {
            watchlist: SourceStats { units: 1, failed: 1, ..SourceStats::default() },
            ..RunDiagnostics::default()
        };

        let mut output = String::new();
        generate(&outcome(diagnostics), true, &mut output).unwrap();
        assert!(output.contains("\x1b["));
    }
}
