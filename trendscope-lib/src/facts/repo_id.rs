use crate::Result;
use core::cmp::Ordering;
use core::fmt::{Display, Formatter};
use core::hash::{Hash, Hasher};
use core::str::FromStr;
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const GITHUB_PREFIXES: [&str; 3] = ["https://github.com/", "http://github.com/", "github.com/"];

/// Identity of a repository in `owner/name` form.
///
/// Equality, hashing, and ordering ignore ASCII case, so `Owner/Repo` and `owner/repo`
/// name the same project. The casing supplied at construction is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    display: Arc<str>,
    key: Arc<str>,
    owner: Arc<str>,
    name: Arc<str>,
}

impl RepoId {
    /// Parse a repository id.
    ///
    /// Accepts `owner/name`, optionally surrounded by whitespace, prefixed with `/` or a
    /// `github.com` URL, and suffixed with `.git` or `/`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut s = text.trim();
        for prefix in GITHUB_PREFIXES {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest;
                break;
            }
        }

        let s = s.trim_start_matches('/').trim_end_matches('/');
        let s = s.strip_suffix(".git").unwrap_or(s);

        let Some((owner, name)) = s.split_once('/') else {
            bail!("invalid repository id '{text}': expected 'owner/name'");
        };

        if owner.is_empty() || name.is_empty() {
            bail!("invalid repository id '{text}': empty owner or name");
        }

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            bail!("invalid repository id '{text}': unexpected characters");
        }

        let display: Arc<str> = Arc::from(format!("{owner}/{name}"));
        Ok(Self {
            key: Arc::from(display.to_ascii_lowercase()),
            owner: Arc::from(owner),
            name: Arc::from(name),
            display,
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id as originally cased.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The lowercase form used for comparisons.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn is_valid_segment(segment: &str) -> bool {
    segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl PartialEq for RepoId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RepoId {}

impl Hash for RepoId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for RepoId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RepoId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display)
    }
}

impl FromStr for RepoId {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.display.to_string()
    }
}
