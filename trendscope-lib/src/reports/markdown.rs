use super::common::{escape_cell, format_count, format_delta, project_link, source_markers, truncate_chars};
use crate::Result;
use crate::diff::{DiffSummary, top_n};
use crate::facts::{ProjectRecord, RepoId, SourceKind};
use crate::history::Snapshot;
use chrono::{DateTime, NaiveDate, Utc};
use core::cmp::Reverse;
use core::fmt::Write;
use std::collections::{BTreeMap, HashMap};

const DESCRIPTION_CHARS: usize = 60;
const TOP_LANGUAGES: usize = 5;
const COMMIT_MESSAGE_CHARS: usize = 40;
const SHORT_SHA: usize = 7;
const TOP_CONTRIBUTORS: usize = 3;

/// Knobs for [`render_markdown`].
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Maximum rows in the new, trending, and keyword sections.
    pub section_limit: usize,
    /// Rows in the "top by stars" section.
    pub top_n: usize,
    pub generated_at: DateTime<Utc>,
}

/// Render the daily report.
#[must_use]
pub fn render_markdown(snapshot: &Snapshot, diff: &DiffSummary, run_date: NaiveDate, options: &ReportOptions) -> String {
    let mut out = String::new();
    _ = generate(snapshot, diff, run_date, options, &mut out);
    out
}

pub fn generate<W: Write>(snapshot: &Snapshot, diff: &DiffSummary, run_date: NaiveDate, options: &ReportOptions, writer: &mut W) -> Result<()> {
    writeln!(writer, "# AI Trend Report - {run_date}")?;
    writeln!(writer)?;
    writeln!(writer, "> Generated at {}", options.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer)?;

    write_overview(snapshot, diff, writer)?;
    write_new(diff, options.section_limit, writer)?;
    write_rising(diff, options.section_limit, writer)?;
    write_trending(snapshot, options.section_limit, writer)?;
    write_keyword_matches(snapshot, options.section_limit, writer)?;
    write_watchlist(snapshot, diff, writer)?;
    write_top(snapshot, options.top_n, writer)?;

    writeln!(writer, "---")?;
    writeln!(writer)?;
    writeln!(writer, "*Generated by trendscope - {run_date}*")?;
    Ok(())
}

fn write_overview<W: Write>(snapshot: &Snapshot, diff: &DiffSummary, writer: &mut W) -> Result<()> {
    writeln!(writer, "## Overview")?;
    writeln!(writer)?;
    writeln!(writer, "- Tracked projects: {}", snapshot.len())?;
    writeln!(writer, "- Trending: {}", snapshot.count_with_source(SourceKind::Trending))?;
    writeln!(writer, "- Keyword matches: {}", snapshot.count_with_source(SourceKind::Keyword))?;
    writeln!(writer, "- Watchlist: {}", snapshot.count_with_source(SourceKind::Watchlist))?;
    writeln!(writer, "- New today: {}", diff.new_projects.len())?;
    writeln!(writer, "- Rising: {}", diff.rising_projects.len())?;
    writeln!(writer, "- Total stars: {}", format_count(snapshot.total_stars()))?;

    let languages = top_languages(snapshot);
    if !languages.is_empty() {
        let list = languages
            .iter()
            .map(|(lang, count)| format!("{lang} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(writer, "- Top languages: {list}")?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_new<W: Write>(diff: &DiffSummary, limit: usize, writer: &mut W) -> Result<()> {
    let entries = top_n(&diff.new_projects, limit);
    if entries.is_empty() {
        return Ok(());
    }

    write_table_header(writer, "New Today", &["Project", "Description", "Stars", "Language"])?;
    for entry in entries {
        let r = &entry.record;
        writeln!(
            writer,
            "| {} | {} | {} | {} |",
            project_link(r),
            description_cell(r),
            format_count(r.star_count),
            language_cell(r)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_rising<W: Write>(diff: &DiffSummary, limit: usize, writer: &mut W) -> Result<()> {
    let entries = top_n(&diff.rising_projects, limit);
    if entries.is_empty() {
        return Ok(());
    }

    write_table_header(writer, "Rising", &["Project", "Stars", "Gained", "Language"])?;
    for entry in entries {
        let r = &entry.record;
        writeln!(
            writer,
            "| {} | {} | +{} | {} |",
            project_link(r),
            format_count(r.star_count),
            format_count(r.stars_gained_in_window),
            language_cell(r)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_trending<W: Write>(snapshot: &Snapshot, limit: usize, writer: &mut W) -> Result<()> {
    let mut trending: Vec<_> = snapshot.records().filter(|r| r.has_source_kind(SourceKind::Trending)).collect();
    if trending.is_empty() {
        return Ok(());
    }

    trending.sort_by(|a, b| {
        Reverse((a.stars_gained_in_window, a.star_count))
            .cmp(&Reverse((b.stars_gained_in_window, b.star_count)))
            .then_with(|| a.repo_id.cmp(&b.repo_id))
    });

    write_table_header(writer, "Trending", &["Project", "Description", "Stars", "Gained", "Language"])?;
    for r in trending.into_iter().take(limit) {
        writeln!(
            writer,
            "| {} | {} | {} | +{} | {} |",
            project_link(r),
            description_cell(r),
            format_count(r.star_count),
            format_count(r.stars_gained_in_window),
            language_cell(r)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_keyword_matches<W: Write>(snapshot: &Snapshot, limit: usize, writer: &mut W) -> Result<()> {
    let mut matches: Vec<_> = snapshot.records().filter(|r| r.has_source_kind(SourceKind::Keyword)).collect();
    if matches.is_empty() {
        return Ok(());
    }

    sort_by_stars(&mut matches);

    write_table_header(writer, "Keyword Matches", &["Project", "Keywords", "Stars"])?;
    for r in matches.into_iter().take(limit) {
        let keywords = r.matched_keywords.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        writeln!(
            writer,
            "| {} | {} | {} |",
            project_link(r),
            escape_cell(&keywords),
            format_count(r.star_count)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_watchlist<W: Write>(snapshot: &Snapshot, diff: &DiffSummary, writer: &mut W) -> Result<()> {
    let mut watched: Vec<_> = snapshot.records().filter(|r| r.is_watchlisted()).collect();
    if watched.is_empty() {
        return Ok(());
    }

    sort_by_stars(&mut watched);

    let new: Vec<&RepoId> = diff.new_projects.iter().map(|e| &e.record.repo_id).collect();
    let changes: HashMap<&RepoId, i128> = diff
        .watchlist_changes
        .iter()
        .filter_map(|e| e.star_delta().map(|d| (&e.record.repo_id, d)))
        .collect();

    write_table_header(
        writer,
        "Watchlist",
        &["Project", "Stars", "Change", "Last Updated", "Latest Commit", "Top Contributors"],
    )?;
    for r in watched {
        let change = if new.contains(&&r.repo_id) {
            "new".to_string()
        } else {
            format_delta(changes.get(&r.repo_id).copied().unwrap_or(0))
        };

        let updated = r.updated_at.map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d").to_string());

        writeln!(
            writer,
            "| {} | {} | {} | {} | {} | {} |",
            project_link(r),
            format_count(r.star_count),
            change,
            updated,
            latest_commit_cell(r),
            contributors_cell(r)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn latest_commit_cell(record: &ProjectRecord) -> String {
    let Some(commit) = record.activity.as_ref().and_then(|a| a.recent_commits.first()) else {
        return "-".to_string();
    };

    let sha: String = commit.sha.chars().take(SHORT_SHA).collect();
    let mut cell = format!("`{sha}` {}", escape_cell(&truncate_chars(&commit.message, COMMIT_MESSAGE_CHARS)));
    if let Some(at) = commit.committed_at {
        let _ = write!(cell, " ({})", at.format("%Y-%m-%d"));
    }
    cell
}

fn contributors_cell(record: &ProjectRecord) -> String {
    let contributors: Vec<String> = record
        .activity
        .iter()
        .flat_map(|a| &a.contributors)
        .take(TOP_CONTRIBUTORS)
        .map(|c| format!("{} ({})", escape_cell(&c.login), format_count(c.contributions)))
        .collect();

    if contributors.is_empty() {
        "-".to_string()
    } else {
        contributors.join(", ")
    }
}

fn write_top<W: Write>(snapshot: &Snapshot, n: usize, writer: &mut W) -> Result<()> {
    let mut all: Vec<_> = snapshot.records().collect();
    sort_by_stars(&mut all);
    all.truncate(n);
    if all.is_empty() {
        return Ok(());
    }

    write_table_header(writer, &format!("Top {} by Stars", all.len()), &["Rank", "Project", "Stars", "Sources"])?;
    for (i, r) in all.into_iter().enumerate() {
        writeln!(
            writer,
            "| {} | {} | {} | {} |",
            i + 1,
            project_link(r),
            format_count(r.star_count),
            source_markers(r)
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_table_header<W: Write>(writer: &mut W, title: &str, columns: &[&str]) -> Result<()> {
    writeln!(writer, "## {title}")?;
    writeln!(writer)?;
    writeln!(writer, "| {} |", columns.join(" | "))?;
    writeln!(writer, "|{}", "---|".repeat(columns.len()))?;
    Ok(())
}

fn sort_by_stars(records: &mut [&ProjectRecord]) {
    records.sort_by(|a, b| Reverse(a.star_count).cmp(&Reverse(b.star_count)).then_with(|| a.repo_id.cmp(&b.repo_id)));
}

fn description_cell(record: &ProjectRecord) -> String {
    record
        .description
        .as_deref()
        .map_or_else(|| "-".to_string(), |d| escape_cell(&truncate_chars(d, DESCRIPTION_CHARS)))
}

fn language_cell(record: &ProjectRecord) -> String {
    record.primary_language.as_deref().map_or_else(|| "-".to_string(), escape_cell)
}

/// Most common primary languages, by project count then name.
fn top_languages(snapshot: &Snapshot) -> Vec<(&str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for lang in snapshot.records().filter_map(|r| r.primary_language.as_deref()) {
        *counts.entry(lang).or_default() += 1;
    }

    let mut languages: Vec<_> = counts.into_iter().collect();
    languages.sort_by_key(|(lang, count)| (Reverse(*count), *lang));
    languages.truncate(TOP_LANGUAGES);
    languages
}
