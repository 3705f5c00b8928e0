use core::fmt::{Display, Formatter};
use ohno::bail;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

const KEYWORD_PREFIX: &str = "keyword:";

/// The kind of source a signal came from, without any parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Trending,
    Keyword,
    Watchlist,
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let name: &'static str = (*self).into();
        f.write_str(name)
    }
}

/// Provenance of a project record.
///
/// Serialized as `trending`, `watchlist`, or `keyword:<kw>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceTag {
    Watchlist,
    Trending,
    Keyword(String),
}

impl SourceTag {
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Watchlist => SourceKind::Watchlist,
            Self::Trending => SourceKind::Trending,
            Self::Keyword(_) => SourceKind::Keyword,
        }
    }

    /// Rank used to pick descriptive fields when fetch timestamps tie.
    ///
    /// Higher wins: watchlist, then trending, then keyword search.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Watchlist => 2,
            Self::Trending => 1,
            Self::Keyword(_) => 0,
        }
    }

    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(kw) => Some(kw),
            Self::Watchlist | Self::Trending => None,
        }
    }
}

impl Display for SourceTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Watchlist => f.write_str("watchlist"),
            Self::Trending => f.write_str("trending"),
            Self::Keyword(kw) => write!(f, "{KEYWORD_PREFIX}{kw}"),
        }
    }
}

impl TryFrom<String> for SourceTag {
    type Error = ohno::AppError;

    fn try_from(value: String) -> crate::Result<Self> {
        match value.as_str() {
            "watchlist" => Ok(Self::Watchlist),
            "trending" => Ok(Self::Trending),
            other => match other.strip_prefix(KEYWORD_PREFIX) {
                Some(kw) if !kw.is_empty() => Ok(Self::Keyword(kw.to_string())),
                _ => bail!("unknown source tag '{other}'"),
            },
        }
    }
}

impl From<SourceTag> for String {
    fn from(value: SourceTag) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_display() {
        assert_eq!(SourceTag::Watchlist.to_string(), "watchlist");
        assert_eq!(SourceTag::Trending.to_string(), "trending");
        assert_eq!(SourceTag::Keyword("llm".into()).to_string(), "keyword:llm");
    }

    #[test]
    fn test_parse_round_trips_through_serde() {
        for tag in [
            SourceTag::Watchlist,
            SourceTag::Trending,
            SourceTag::Keyword("stable diffusion".into()),
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            let back: SourceTag = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tag);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let _ = SourceTag::try_from("search".to_string()).unwrap_err();
        let _ = SourceTag::try_from("keyword:".to_string()).unwrap_err();
    }

    #[test]
    fn test_precedence_order() {
        assert!(SourceTag::Watchlist.precedence() > SourceTag::Trending.precedence());
        assert!(SourceTag::Trending.precedence() > SourceTag::Keyword("gpt".into()).precedence());
    }

    #[test]
    fn test_set_ordering_is_stable() {
        let set: BTreeSet<_> = [
            SourceTag::Keyword("b".into()),
            SourceTag::Trending,
            SourceTag::Keyword("a".into()),
            SourceTag::Watchlist,
        ]
        .into_iter()
        .collect();

        let rendered: Vec<_> = set.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["watchlist", "trending", "keyword:a", "keyword:b"]);
    }

    #[test]
    fn test_kind() {
        assert_eq!(SourceTag::Keyword("ai".into()).kind(), SourceKind::Keyword);
        assert_eq!(SourceKind::Watchlist.to_string(), "watchlist");
    }
}
