//! GitHub as a source of project signals.

mod client;
mod provider;
mod trending;

pub use provider::GitHubFetcher;
pub use trending::parse_trending_page;
