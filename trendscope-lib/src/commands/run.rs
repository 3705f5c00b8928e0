//! Command dispatch logic for trendscope

use super::{InitArgs, ReportArgs, TrackArgs, ValidateArgs, init_config, render_report, track, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use ohno::app_err;
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Exit status clap uses for usage errors.
const USAGE_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "trendscope", version, author, long_about = None)]
#[command(about = "Track trending AI projects on GitHub and report what changed each day")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch today's signals, archive a snapshot, and write the daily report
    Track(Box<TrackArgs>),
    /// Re-render the daily report for an archived date
    Report(ReportArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// Usage errors are written to the host's error stream and request exit code 2.
/// Help and version requests are written to the host's output stream.
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            let _ = write!(host.output(), "{e}");
            return Ok(());
        }
        Err(e) => {
            let _ = write!(host.error(), "{e}");
            host.exit(USAGE_EXIT_CODE);
            return Err(app_err!("invalid command line ({:?})", e.kind()));
        }
    };

    match &cli.command {
        Command::Track(args) => track(host, args).await,
        Command::Report(args) => render_report(host, args).await,
        Command::Init(args) => init_config(host, args),
        Command::Validate(args) => validate_config(host, args),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[tokio::test]
    async fn test_help_goes_to_output() {
        let mut host = TestHost::new();
        run(&mut host, ["trendscope", "--help"]).await.unwrap();
        assert!(host.output_text().contains("track"));
        assert_eq!(host.exit_code, None);
    }

    #[tokio::test]
    async fn test_invalid_date_is_usage_error() {
        let mut host = TestHost::new();
        let result = run(&mut host, ["trendscope", "track", "--date", "2026-02-30"]).await;
        assert!(result.is_err());
        assert_eq!(host.exit_code, Some(USAGE_EXIT_CODE));
        assert!(host.error_text().contains("--date"));
    }

    #[tokio::test]
    async fn test_missing_subcommand() {
        let mut host = TestHost::new();
        assert!(run(&mut host, ["trendscope"]).await.is_err());
        assert_eq!(host.exit_code, Some(USAGE_EXIT_CODE));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
