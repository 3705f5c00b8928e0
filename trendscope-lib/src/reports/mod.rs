//! Report generation for tracking runs
//!
//! Three generators are provided:
//! - **Markdown**: the daily report, rendered from a snapshot and its diff and archived
//!   alongside the snapshot history
//! - **Console**: the end-of-run summary with per-source coverage, optionally colored
//! - **JSON**: the diff summary and run diagnostics for programmatic consumers
//!
//! Formatting shared between generators (thousands separators, table cell escaping,
//! source markers) lives in the `common` module.

mod common;
mod console;
mod json;
mod markdown;

pub use console::generate as generate_console;
pub use json::generate as generate_json;
pub use markdown::{ReportOptions, generate as generate_markdown, render_markdown};
