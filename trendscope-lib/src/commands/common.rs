//! Arguments and setup shared between commands.

use super::ProgressReporter;
use crate::Result;
use crate::facts::Progress;
use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::IntoAppError;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

const PROGRESS_DELAY: Duration = Duration::from_millis(300);

// Long enough that the bar never shows while log lines are being written.
const PROGRESS_DELAY_WHEN_LOGGING: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

impl ColorMode {
    #[must_use]
    pub const fn resolve(self, is_terminal: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => is_terminal,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by commands that read configuration and history
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (default is `trendscope.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the dataset, snapshot history, and daily reports
    #[arg(long, value_name = "PATH", default_value = "data")]
    pub data_dir: Utf8PathBuf,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,

    /// Shorthand for `--log-level debug`
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl CommonArgs {
    #[must_use]
    pub const fn effective_log_level(&self) -> LogLevel {
        if self.verbose { LogLevel::Debug } else { self.log_level }
    }

    /// Whether console output should carry ANSI colors.
    #[must_use]
    pub fn use_colors(&self) -> bool {
        self.color.resolve(std::io::stdout().is_terminal())
    }
}

/// Initialize the logger. `RUST_LOG` overrides the chosen level.
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A logger may already be installed when several commands run in one process.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// Use the given cache directory, or the platform's cache directory.
pub fn resolve_cache_dir(cache_dir: Option<&Utf8PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cache_dir {
        return Ok(path.as_std_path().to_path_buf());
    }

    Ok(BaseDirs::new()
        .into_app_err("could not determine cache directory")?
        .cache_dir()
        .join("trendscope"))
}

/// Progress display for a run. It stays hidden while logging is enabled.
#[must_use]
pub fn new_progress(log_level: LogLevel, color: ColorMode) -> Arc<dyn Progress> {
    let delay = if log_level == LogLevel::None {
        PROGRESS_DELAY
    } else {
        PROGRESS_DELAY_WHEN_LOGGING
    };

    Arc::new(ProgressReporter::new(delay, color.resolve(std::io::stderr().is_terminal())))
}

/// Today's date in local time.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
