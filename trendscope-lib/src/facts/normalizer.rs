//! Conversion of source-shaped signals into canonical project records.

use super::raw_signal::{CommitPayload, ContributorPayload, RawSignal, RepositoryPayload, SignalPayload, TrendingEntry, WatchedRepository};
use super::{Contributor, ProjectRecord, RecentCommit, RepoActivity, RepoId, SourceTag};
use chrono::{DateTime, NaiveDate, Utc};
use core::fmt::{Display, Formatter};
use std::collections::BTreeSet;

/// A signal that cannot be turned into a [`ProjectRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSignal {
    pub reason: String,
}

impl MalformedSignal {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Display for MalformedSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "malformed signal: {}", self.reason)
    }
}

impl std::error::Error for MalformedSignal {}

/// Convert a raw signal into a project record attributed to `tag`.
///
/// Both lifecycle dates are set to `run_date`; carrying `first_seen_date` forward from
/// history happens after records are merged.
pub fn normalize(signal: &RawSignal, tag: &SourceTag, run_date: NaiveDate) -> Result<ProjectRecord, MalformedSignal> {
    let (fields, activity) = match (&signal.payload, tag) {
        (SignalPayload::Trending(entry), SourceTag::Trending) => (from_trending(entry)?, None),
        (SignalPayload::Keyword(repo), SourceTag::Keyword(_)) => (from_repository(repo)?, None),
        (SignalPayload::Watchlist(watched), SourceTag::Watchlist) => {
            (from_repository(&watched.repo)?, activity(watched, signal.fetched_at))
        }
        (payload, tag) => {
            return Err(MalformedSignal::new(format!(
                "{} payload cannot be attributed to source '{tag}'",
                payload_kind(payload)
            )));
        }
    };

    Ok(ProjectRecord {
        display_name: fields.display_name.unwrap_or_else(|| fields.repo_id.name().to_string()),
        url: fields.url.unwrap_or_else(|| format!("https://github.com/{}", fields.repo_id)),
        repo_id: fields.repo_id,
        description: non_empty(fields.description),
        primary_language: non_empty(fields.primary_language),
        star_count: fields.star_count,
        stars_gained_in_window: fields.stars_gained,
        forks: fields.forks,
        topics: fields.topics,
        license: non_empty(fields.license),
        updated_at: fields.updated_at,
        sources: BTreeSet::from([tag.clone()]),
        matched_keywords: tag.keyword().map(str::to_string).into_iter().collect(),
        first_seen_date: run_date,
        last_seen_date: run_date,
        fetched_at: signal.fetched_at,
        described_by: tag.clone(),
        activity,
    })
}

struct Fields {
    repo_id: RepoId,
    display_name: Option<String>,
    description: Option<String>,
    primary_language: Option<String>,
    url: Option<String>,
    star_count: u64,
    stars_gained: u64,
    forks: Option<u64>,
    topics: Vec<String>,
    license: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

fn from_trending(entry: &TrendingEntry) -> Result<Fields, MalformedSignal> {
    let repo_id = RepoId::parse(&entry.repo_path)
        .map_err(|e| MalformedSignal::new(format!("trending entry has bad repository path: {e}")))?;

    let star_count = parse_count(&entry.stars_text)
        .ok_or_else(|| MalformedSignal::new(format!("unparsable star count '{}' for '{repo_id}'", entry.stars_text)))?;

    let stars_gained = match &entry.gained_text {
        Some(text) => parse_count(text)
            .ok_or_else(|| MalformedSignal::new(format!("unparsable stars gained '{text}' for '{repo_id}'")))?,
        None => 0,
    };

    let forks = match &entry.forks_text {
        Some(text) => Some(
            parse_count(text).ok_or_else(|| MalformedSignal::new(format!("unparsable fork count '{text}' for '{repo_id}'")))?,
        ),
        None => None,
    };

    Ok(Fields {
        display_name: Some(repo_id.name().to_string()),
        repo_id,
        description: entry.description.clone(),
        primary_language: entry.language.clone(),
        url: None,
        star_count,
        stars_gained,
        forks,
        topics: Vec::new(),
        license: None,
        updated_at: None,
    })
}

fn from_repository(repo: &RepositoryPayload) -> Result<Fields, MalformedSignal> {
    let full_name = repo
        .full_name
        .as_deref()
        .ok_or_else(|| MalformedSignal::new("repository payload has no full_name"))?;

    let repo_id = RepoId::parse(full_name).map_err(|e| MalformedSignal::new(format!("{e}")))?;

    let star_count = match repo.stargazers_count {
        Some(count) => u64::try_from(count)
            .ok()
            .ok_or_else(|| MalformedSignal::new(format!("negative star count {count} for '{repo_id}'")))?,
        None => 0,
    };

    let forks = match repo.forks_count {
        Some(count) => Some(
            u64::try_from(count)
                .ok()
                .ok_or_else(|| MalformedSignal::new(format!("negative fork count {count} for '{repo_id}'")))?,
        ),
        None => None,
    };

    let license = repo
        .license
        .as_ref()
        .and_then(|l| l.spdx_id.clone().filter(|id| id != "NOASSERTION").or_else(|| l.name.clone()));

    Ok(Fields {
        display_name: repo.name.clone(),
        repo_id,
        description: repo.description.clone(),
        primary_language: repo.language.clone(),
        url: repo.html_url.clone(),
        star_count,
        stars_gained: 0,
        forks,
        topics: repo.topics.clone(),
        license,
        updated_at: repo.pushed_at.or(repo.updated_at),
    })
}

/// Recent activity of a watched repository, when at least one of its lookups succeeded.
///
/// Entries without an identity (commit sha, contributor login) are dropped rather than
/// failing the whole record.
fn activity(watched: &WatchedRepository, fetched_at: DateTime<Utc>) -> Option<RepoActivity> {
    if watched.recent_commits.is_none() && watched.contributors.is_none() {
        return None;
    }

    let recent_commits = watched.recent_commits.iter().flatten().filter_map(recent_commit).collect();
    let contributors = watched.contributors.iter().flatten().filter_map(contributor).collect();

    Some(RepoActivity {
        fetched_at,
        recent_commits,
        contributors,
    })
}

fn recent_commit(payload: &CommitPayload) -> Option<RecentCommit> {
    let sha = non_empty(payload.sha.clone())?;
    let message = payload
        .commit
        .message
        .as_deref()
        .and_then(|m| m.lines().next())
        .unwrap_or_default()
        .trim()
        .to_string();
    let author = payload.commit.author.as_ref();

    Some(RecentCommit {
        sha,
        message,
        author: non_empty(author.and_then(|a| a.name.clone())),
        committed_at: author.and_then(|a| a.date),
    })
}

fn contributor(payload: &ContributorPayload) -> Option<Contributor> {
    Some(Contributor {
        login: non_empty(payload.login.clone())?,
        contributions: u64::try_from(payload.contributions.unwrap_or_default()).ok()?,
    })
}

const fn payload_kind(payload: &SignalPayload) -> &'static str {
    match payload {
        SignalPayload::Trending(_) => "trending",
        SignalPayload::Keyword(_) => "keyword",
        SignalPayload::Watchlist(_) => "watchlist",
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a count as shown on a web page: `1234`, `1,234`, `3k`, or `1.2k`.
///
/// Blank text counts as zero. Returns `None` for anything else, including negative values.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.is_empty() {
        return Some(0);
    }

    let Some(thousands) = cleaned.strip_suffix('k') else {
        return cleaned.parse::<u64>().ok().filter(|_| cleaned.bytes().all(|b| b.is_ascii_digit()));
    };

    let (whole, frac) = thousands.split_once('.').unwrap_or((thousands, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) || frac.len() > 3 {
        return None;
    }

    let whole: u64 = whole.parse().ok()?;
    let frac_value: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<3}").parse().ok()?
    };

    whole.checked_mul(1000)?.checked_add(frac_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::raw_signal::{CommitAuthor, CommitDetail, LicensePayload};

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 25).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn trending(path: &str, stars: &str, gained: Option<&str>) -> RawSignal {
        RawSignal {
            fetched_at: at(1000),
            payload: SignalPayload::Trending(TrendingEntry {
                repo_path: path.into(),
                description: Some("  A small LLM runtime ".into()),
                language: Some("Rust".into()),
                stars_text: stars.into(),
                forks_text: Some("1.2k".into()),
                gained_text: gained.map(Into::into),
            }),
        }
    }

    fn api_repo(full_name: Option<&str>, stars: Option<i64>) -> RepositoryPayload {
        RepositoryPayload {
            full_name: full_name.map(Into::into),
            name: full_name.and_then(|n| n.split('/').nth(1)).map(Into::into),
            html_url: full_name.map(|n| format!("https://github.com/{n}")),
            description: Some("Transformers for everyone".into()),
            language: Some("Python".into()),
            stargazers_count: stars,
            forks_count: Some(5),
            topics: vec!["nlp".into()],
            license: Some(LicensePayload {
                spdx_id: Some("Apache-2.0".into()),
                name: Some("Apache License 2.0".into()),
            }),
            pushed_at: Some(at(500)),
            updated_at: Some(at(400)),
        }
    }

    #[test]
    fn test_parse_count_forms() {
        assert_eq!(parse_count("1234"), Some(1234));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count(" 12,345 "), Some(12_345));
        assert_eq!(parse_count("3k"), Some(3000));
        assert_eq!(parse_count("1.2k"), Some(1200));
        assert_eq!(parse_count("1.25K"), Some(1250));
        assert_eq!(parse_count(""), Some(0));
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        assert_eq!(parse_count("-5"), None);
        assert_eq!(parse_count("lots"), None);
        assert_eq!(parse_count("1.2345k"), None);
        assert_eq!(parse_count("k"), None);
        assert_eq!(parse_count("+5"), None);
    }

    #[test]
    fn test_normalize_trending() {
        let rec = normalize(&trending("/Owner/Repo", "2,500", Some("340")), &SourceTag::Trending, run_date()).unwrap();

        assert_eq!(rec.repo_id.as_str(), "Owner/Repo");
        assert_eq!(rec.display_name, "Repo");
        assert_eq!(rec.url, "https://github.com/Owner/Repo");
        assert_eq!(rec.description.as_deref(), Some("A small LLM runtime"));
        assert_eq!(rec.star_count, 2500);
        assert_eq!(rec.stars_gained_in_window, 340);
        assert_eq!(rec.forks, Some(1200));
        assert_eq!(rec.sources, BTreeSet::from([SourceTag::Trending]));
        assert!(rec.matched_keywords.is_empty());
        assert_eq!(rec.first_seen_date, run_date());
        assert_eq!(rec.last_seen_date, run_date());
        assert_eq!(rec.described_by, SourceTag::Trending);
    }

    #[test]
    fn test_normalize_keyword() {
        let signal = RawSignal {
            fetched_at: at(2000),
            payload: SignalPayload::Keyword(api_repo(Some("huggingface/transformers"), Some(150_000))),
        };
        let tag = SourceTag::Keyword("transformer".into());
        let rec = normalize(&signal, &tag, run_date()).unwrap();

        assert_eq!(rec.star_count, 150_000);
        assert_eq!(rec.stars_gained_in_window, 0);
        assert_eq!(rec.matched_keywords, BTreeSet::from(["transformer".to_string()]));
        assert_eq!(rec.license.as_deref(), Some("Apache-2.0"));
        assert_eq!(rec.updated_at, Some(at(500)));
        assert_eq!(rec.fetched_at, at(2000));
    }

    #[test]
    fn test_normalize_watchlist_without_stars_counts_zero() {
        let signal = RawSignal {
            fetched_at: at(3000),
            payload: SignalPayload::Watchlist(api_repo(Some("ollama/ollama"), None).into()),
        };
        let rec = normalize(&signal, &SourceTag::Watchlist, run_date()).unwrap();
        assert_eq!(rec.star_count, 0);
        assert!(rec.is_watchlisted());
        assert_eq!(rec.activity, None);
    }

    #[test]
    fn test_normalize_watchlist_activity() {
        let commit = |sha: Option<&str>, message: &str| CommitPayload {
            sha: sha.map(Into::into),
            commit: CommitDetail {
                message: Some(message.into()),
                author: Some(CommitAuthor {
                    name: Some("Jane".into()),
                    date: Some(at(2500)),
                }),
            },
        };

        let signal = RawSignal {
            fetched_at: at(3000),
            payload: SignalPayload::Watchlist(WatchedRepository {
                repo: api_repo(Some("ollama/ollama"), Some(10)),
                recent_commits: Some(vec![commit(Some("abc"), "Fix tokenizer\n\nDetails"), commit(None, "orphan")]),
                contributors: Some(vec![
                    ContributorPayload {
                        login: Some("jane".into()),
                        contributions: Some(40),
                    },
                    ContributorPayload {
                        login: None,
                        contributions: Some(3),
                    },
                ]),
            }),
        };

        let activity = normalize(&signal, &SourceTag::Watchlist, run_date()).unwrap().activity.unwrap();
        assert_eq!(activity.fetched_at, at(3000));
        assert_eq!(
            activity.recent_commits,
            [RecentCommit {
                sha: "abc".into(),
                message: "Fix tokenizer".into(),
                author: Some("Jane".into()),
                committed_at: Some(at(2500)),
            }]
        );
        assert_eq!(
            activity.contributors,
            [Contributor {
                login: "jane".into(),
                contributions: 40,
            }]
        );
    }

    #[test]
    fn test_failed_commit_lookup_keeps_contributors() {
        let signal = RawSignal {
            fetched_at: at(3000),
            payload: SignalPayload::Watchlist(WatchedRepository {
                repo: api_repo(Some("a/b"), Some(1)),
                recent_commits: None,
                contributors: Some(Vec::new()),
            }),
        };

        let activity = normalize(&signal, &SourceTag::Watchlist, run_date()).unwrap().activity.unwrap();
        assert!(activity.recent_commits.is_empty());
        assert!(activity.contributors.is_empty());
    }

    #[test]
    fn test_missing_full_name_is_malformed() {
        let signal = RawSignal {
            fetched_at: at(0),
            payload: SignalPayload::Keyword(api_repo(None, Some(1))),
        };
        let err = normalize(&signal, &SourceTag::Keyword("ai".into()), run_date()).unwrap_err();
        assert!(err.reason.contains("full_name"));
    }

    #[test]
    fn test_negative_stars_are_malformed() {
        let signal = RawSignal {
            fetched_at: at(0),
            payload: SignalPayload::Watchlist(api_repo(Some("a/b"), Some(-3)).into()),
        };
        let err = normalize(&signal, &SourceTag::Watchlist, run_date()).unwrap_err();
        assert!(err.to_string().contains("negative star count"));
    }

    #[test]
    fn test_unparsable_trending_stars_are_malformed() {
        let _ = normalize(&trending("/a/b", "many", None), &SourceTag::Trending, run_date()).unwrap_err();
    }

    #[test]
    fn test_bad_repo_path_is_malformed() {
        let _ = normalize(&trending("/just-one-segment", "1", None), &SourceTag::Trending, run_date()).unwrap_err();
    }

    #[test]
    fn test_mismatched_tag_is_malformed() {
        let err = normalize(&trending("/a/b", "1", None), &SourceTag::Watchlist, run_date()).unwrap_err();
        assert!(err.reason.contains("trending payload"));
    }

    #[test]
    fn test_noassertion_license_falls_back_to_name() {
        let mut repo = api_repo(Some("a/b"), Some(1));
        repo.license = Some(LicensePayload {
            spdx_id: Some("NOASSERTION".into()),
            name: Some("Other".into()),
        });
        let signal = RawSignal {
            fetched_at: at(0),
            payload: SignalPayload::Watchlist(repo.into()),
        };
        let rec = normalize(&signal, &SourceTag::Watchlist, run_date()).unwrap();
        assert_eq!(rec.license.as_deref(), Some("Other"));
    }
}
