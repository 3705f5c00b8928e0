use super::FirstSeenIndex;
use crate::facts::{ProjectRecord, RepoId, SourceKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The merged dataset of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_date: NaiveDate,
    pub projects: BTreeMap<RepoId, ProjectRecord>,
}

impl Snapshot {
    #[must_use]
    pub const fn new(run_date: NaiveDate, projects: BTreeMap<RepoId, ProjectRecord>) -> Self {
        Self { run_date, projects }
    }

    /// Build today's snapshot from merged records, stamping lifecycle dates.
    ///
    /// `first_seen_date` is the earliest archived sighting when `first_seen` knows the project,
    /// however many runs ago that was, and today's date otherwise. `last_seen_date` is always today.
    #[must_use]
    pub fn stamped(run_date: NaiveDate, mut projects: BTreeMap<RepoId, ProjectRecord>, first_seen: &FirstSeenIndex) -> Self {
        for (repo_id, record) in &mut projects {
            record.first_seen_date = first_seen.get(repo_id).map_or(run_date, |earlier| earlier.min(run_date));
            record.last_seen_date = run_date;
        }

        Self { run_date, projects }
    }

    #[must_use]
    pub fn get(&self, repo_id: &RepoId) -> Option<&ProjectRecord> {
        self.projects.get(repo_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProjectRecord> {
        self.projects.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Number of projects with at least one signal of `kind`.
    #[must_use]
    pub fn count_with_source(&self, kind: SourceKind) -> usize {
        self.records().filter(|r| r.has_source_kind(kind)).count()
    }

    #[must_use]
    pub fn total_stars(&self) -> u64 {
        self.records().map(|r| r.star_count).sum()
    }
}
