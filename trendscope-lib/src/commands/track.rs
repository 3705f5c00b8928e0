use super::Host;
use super::common::{CommonArgs, init_logging, new_progress, resolve_cache_dir, today};
use super::config::Config;
use crate::Result;
use crate::facts::{Cache, Collector, GitHubFetcher, Progress};
use crate::history::HistoryStore;
use crate::pipeline::{RunOutcome, run_pipeline};
use crate::reports::{generate_console, generate_json, render_markdown};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use ohno::IntoAppError;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "     track";

#[derive(Parser, Debug)]
pub struct TrackArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Date to record the run under, as YYYY-MM-DD (default is today)
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Directory where fetched results are cached
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Ignore cached data and fetch everything fresh
    #[arg(long)]
    pub ignore_cached: bool,

    /// Skip writing the daily Markdown report
    #[arg(long)]
    pub no_report: bool,

    /// Write the diff summary and run diagnostics to a JSON file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub json: Option<Utf8PathBuf>,
}

/// Fetch, merge, and archive today's signals, then report what changed.
pub async fn track<H: Host>(host: &mut H, args: &TrackArgs) -> Result<()> {
    init_logging(args.common.effective_log_level());

    let config = Config::load(Utf8Path::new("."), args.common.config.as_ref())?;
    let run_date = args.date.unwrap_or_else(today);
    let cache_dir = resolve_cache_dir(args.cache_dir.as_ref())?;

    let fetcher = GitHubFetcher::new(
        args.github_token.as_deref(),
        config.api_base_url()?,
        config.web_base_url()?,
        config.search_languages.clone(),
        config.results_per_keyword,
    )?;

    check_quota(&fetcher, config.rate_limit_buffer).await;

    let progress = new_progress(args.common.effective_log_level(), args.common.color);
    let result = track_with_progress(fetcher, &config, args, run_date, cache_dir, &progress).await;
    progress.done();

    let (outcome, report_path) = match result {
        Ok(done) => done,
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Tracking run for {run_date} failed: {e}");
            host.exit(1);
            return Err(e);
        }
    };

    let mut summary = String::new();
    generate_console(&outcome, args.common.use_colors(), &mut summary)?;
    let _ = write!(host.output(), "{summary}");

    if let Some(path) = report_path {
        let _ = writeln!(host.output(), "\nReport written to {}", path.display());
    }

    Ok(())
}

async fn track_with_progress(
    fetcher: GitHubFetcher,
    config: &Config,
    args: &TrackArgs,
    run_date: NaiveDate,
    cache_dir: PathBuf,
    progress: &Arc<dyn Progress>,
) -> Result<(RunOutcome, Option<PathBuf>)> {
    let store = HistoryStore::open(args.common.data_dir.as_std_path()).await?;
    let cache = Cache::new(cache_dir, Utc::now(), args.ignore_cached);
    let collector = Collector::new(fetcher, cache, config.collector_config()?, Arc::clone(progress)).await?;

    log::info!(target: LOG_TARGET, "Tracking run for {run_date}");
    let outcome = run_pipeline(&collector, &store, run_date, config.rising_threshold, config.run_timeout()).await?;

    let report_path = if args.no_report {
        None
    } else {
        progress.set_phase("Reporting");
        progress.set_indeterminate(Box::new(move || format!("rendering report for {run_date}")));

        let markdown = render_markdown(&outcome.snapshot, &outcome.diff, run_date, &config.report_options(Utc::now()));
        let path = store.write_report(run_date, &markdown)?;
        log::info!(target: LOG_TARGET, "Report saved to '{}'", path.display());

        let pruned = store.prune_reports(config.report.retention_days, run_date)?;
        if pruned > 0 {
            log::info!(target: LOG_TARGET, "Removed {pruned} report(s) older than {} days", config.report.retention_days);
        }

        Some(path)
    };

    if let Some(path) = &args.json {
        let mut json = String::new();
        generate_json(&outcome, &mut json)?;
        fs::write(path, json).into_app_err_with(|| format!("writing JSON summary to '{path}'"))?;
    }

    Ok((outcome, report_path))
}

/// Log the remaining API quota before any fetching starts. Failures are not fatal.
async fn check_quota(fetcher: &GitHubFetcher, buffer: u64) {
    match fetcher.rate_limit_status().await {
        Ok(quota) => {
            log::info!(
                target: LOG_TARGET,
                "GitHub API quota: {} request(s) remaining, resets at {}",
                quota.remaining,
                quota.reset_at.format("%H:%M UTC")
            );
            if quota.remaining < buffer {
                log::warn!(
                    target: LOG_TARGET,
                    "Only {} GitHub API request(s) remain (buffer is {buffer}), some fetches may fail",
                    quota.remaining
                );
            }
        }
        Err(e) => log::warn!(target: LOG_TARGET, "Could not check the GitHub API quota: {e}"),
    }
}
