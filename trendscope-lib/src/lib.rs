#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for trendscope
//!
//! This library consolidates all functionality for the trendscope tool, which tracks
//! trending AI projects on GitHub and reports what changed from one day to the next.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`facts`]: Signal collection, normalization, and merging
//! - [`history`]: Day-over-day snapshot persistence
//! - [`diff`]: Comparison of a snapshot against its predecessor
//! - [`pipeline`]: The fetch, merge, persist, and diff sequence for one run
//! - [`reports`]: Report generation in multiple formats

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod diff;
#[cfg(not(any(debug_assertions, test)))]
mod diff;

mod dir_lock;

#[cfg(any(debug_assertions, test))]
pub mod facts;
#[cfg(not(any(debug_assertions, test)))]
mod facts;

#[cfg(any(debug_assertions, test))]
pub mod history;
#[cfg(not(any(debug_assertions, test)))]
mod history;

#[cfg(any(debug_assertions, test))]
pub mod pipeline;
#[cfg(not(any(debug_assertions, test)))]
mod pipeline;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};
