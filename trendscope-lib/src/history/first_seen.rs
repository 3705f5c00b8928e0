use super::Snapshot;
use crate::facts::RepoId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Earliest date each project appears anywhere in the archive.
///
/// Dates only ever move earlier. `covered` lists the run dates already folded in, so a
/// store can catch the index up from snapshots written after it was last saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstSeenIndex {
    covered: BTreeSet<NaiveDate>,
    first_seen: BTreeMap<RepoId, NaiveDate>,
}

impl FirstSeenIndex {
    /// Fold in every project of `snapshot`.
    pub fn record(&mut self, snapshot: &Snapshot) {
        let _ = self.covered.insert(snapshot.run_date);
        for record in snapshot.records() {
            let seen = record.first_seen_date.min(snapshot.run_date);
            let _ = self
                .first_seen
                .entry(record.repo_id.clone())
                .and_modify(|date| *date = (*date).min(seen))
                .or_insert(seen);
        }
    }

    #[must_use]
    pub fn is_covered(&self, run_date: NaiveDate) -> bool {
        self.covered.contains(&run_date)
    }

    #[must_use]
    pub fn get(&self, repo_id: &RepoId) -> Option<NaiveDate> {
        self.first_seen.get(repo_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::facts::test_support::record;
    use crate::facts::{SourceTag, merge};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn snapshot(day: u32, repos: &[&str]) -> Snapshot {
        Snapshot::new(date(day), merge(repos.iter().map(|repo| record(repo, SourceTag::Trending, 1))))
    }

    #[test]
    fn test_keeps_earliest_date_across_gaps() {
        let mut index = FirstSeenIndex::default();
        index.record(&snapshot(3, &["a/b"]));
        index.record(&snapshot(2, &["c/d"]));
        index.record(&snapshot(1, &["A/B"]));

        assert_eq!(index.get(&RepoId::parse("a/b").unwrap()), Some(date(1)));
        assert_eq!(index.get(&RepoId::parse("c/d").unwrap()), Some(date(2)));
        assert_eq!(index.get(&RepoId::parse("e/f").unwrap()), None);
        assert_eq!(index.len(), 2);
        assert!(index.is_covered(date(2)));
        assert!(!index.is_covered(date(4)));
    }

    #[test]
    fn test_uses_recorded_first_seen_dates() {
        let mut snap = snapshot(20, &["a/b"]);
        for rec in snap.projects.values_mut() {
            rec.first_seen_date = date(5);
        }

        let mut index = FirstSeenIndex::default();
        index.record(&snap);
        assert_eq!(index.get(&RepoId::parse("a/b").unwrap()), Some(date(5)));
    }

    #[test]
    fn test_json_shape() {
        let mut index = FirstSeenIndex::default();
        index.record(&snapshot(1, &["Owner/Repo"]));

        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(value["covered"][0], "2026-02-01");
        assert_eq!(value["first_seen"]["Owner/Repo"], "2026-02-01");

        let back: FirstSeenIndex = serde_json::from_value(value).unwrap();
        assert_eq!(back, index);
    }
}
