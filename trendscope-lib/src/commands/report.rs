use super::Host;
use super::common::{CommonArgs, init_logging, today};
use super::config::Config;
use crate::Result;
use crate::diff::diff;
use crate::history::HistoryStore;
use crate::reports::render_markdown;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io::Write;

const LOG_TARGET: &str = "    report";

#[derive(Parser, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Archived date to render, as YYYY-MM-DD (default is today)
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Write the report to this file instead of standard output
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

/// Re-render the Markdown report for an archived date without fetching anything.
pub async fn render_report<H: Host>(host: &mut H, args: &ReportArgs) -> Result<()> {
    init_logging(args.common.effective_log_level());

    let config = Config::load(Utf8Path::new("."), args.common.config.as_ref())?;
    let run_date = args.date.unwrap_or_else(today);
    let store = HistoryStore::open(args.common.data_dir.as_std_path()).await?;

    let Some(snapshot) = store.read(run_date)? else {
        bail!("no snapshot recorded for {run_date} in '{}'", args.common.data_dir);
    };

    let prior = store.read_latest_before(run_date);
    let diff = diff(&snapshot, prior.as_ref(), config.rising_threshold);
    let markdown = render_markdown(&snapshot, &diff, run_date, &config.report_options(Utc::now()));

    match &args.output {
        Some(path) => {
            fs::write(path, &markdown).into_app_err_with(|| format!("writing report to '{path}'"))?;
            log::info!(target: LOG_TARGET, "Report for {run_date} saved to '{path}'");
            let _ = writeln!(host.output(), "Report written to {path}");
        }
        None => {
            let _ = write!(host.output(), "{markdown}");
        }
    }

    Ok(())
}
