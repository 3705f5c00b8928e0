use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use std::sync::Arc;

/// Why a source fetch failed.
///
/// Cloneable so a single-flighted outcome can be handed to every waiter.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Credentials missing, invalid, or insufficient. Never retried.
    Auth(Arc<ohno::AppError>),

    /// The platform refused the request until `reset_at` (when known).
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Transport failure, timeout, server error, or undecodable body.
    Network(Arc<ohno::AppError>),

    /// The requested resource does not exist.
    NotFound(String),
}

impl FetchError {
    pub fn auth(err: impl Into<ohno::AppError>) -> Self {
        Self::Auth(Arc::new(err.into()))
    }

    pub fn network(err: impl Into<ohno::AppError>) -> Self {
        Self::Network(Arc::new(err.into()))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "authentication failed: {e:#}"),
            Self::RateLimited { reset_at: Some(at) } => write!(f, "rate limited until {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            Self::RateLimited { reset_at: None } => f.write_str("rate limited"),
            Self::Network(e) => write!(f, "network error: {e:#}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl core::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let reset_at = DateTime::from_timestamp(1_771_977_600, 0);
        assert_eq!(
            FetchError::RateLimited { reset_at }.to_string(),
            "rate limited until 2026-02-25 00:00:00 UTC"
        );
        assert_eq!(FetchError::RateLimited { reset_at: None }.to_string(), "rate limited");
        assert_eq!(FetchError::NotFound("a/b".into()).to_string(), "not found: a/b");
        assert!(FetchError::auth(ohno::app_err!("bad token")).to_string().starts_with("authentication failed"));
        assert!(FetchError::network(ohno::app_err!("reset")).to_string().starts_with("network error"));
    }

    #[test]
    fn test_predicates() {
        assert!(FetchError::auth(ohno::app_err!("x")).is_auth());
        assert!(FetchError::RateLimited { reset_at: None }.is_rate_limited());
        assert!(!FetchError::NotFound(String::new()).is_rate_limited());
    }
}
