//! Command-line interface and orchestration for trendscope
//!
//! This module implements the CLI commands and wires the collector, history store,
//! and report generators into end-to-end workflows.
//!
//! ## Commands
//!
//! - **track**: Fetch trending, keyword, and watchlist signals, merge them into a
//!   snapshot, archive it, and write the daily report and run summary
//! - **report**: Re-render the daily report for a date that is already archived
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file
//!
//! The `run` function parses command-line arguments with clap and routes to the
//! handler. Output goes through the [`Host`] trait so commands can be driven from tests.
//!
//! Configuration lives in `trendscope.toml`; every key is optional and falls back to the
//! defaults embedded from `default_config.toml`.

mod common;
mod config;
mod host;
mod init;
mod progress_reporter;
mod report;
mod run;
mod track;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

#[cfg(any(debug_assertions, test))]
pub use host::TestHost;
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use report::{ReportArgs, render_report};
pub use run::run;
pub use track::{TrackArgs, track};
pub use validate::{ValidateArgs, validate_config};
