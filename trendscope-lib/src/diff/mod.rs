//! What changed between a snapshot and its predecessor.

use crate::facts::ProjectRecord;
use crate::history::Snapshot;
use core::cmp::Reverse;
use serde::Serialize;

/// A record in one of the diff lists, with its star count in the prior snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub record: ProjectRecord,
    pub prior_stars: Option<u64>,
}

impl DiffEntry {
    /// Change in stars since the prior snapshot, when the project was in it.
    #[must_use]
    pub fn star_delta(&self) -> Option<i128> {
        self.prior_stars.map(|prior| i128::from(self.record.star_count) - i128::from(prior))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Projects absent from the prior snapshot.
    pub new_projects: Vec<DiffEntry>,

    /// Projects present in both whose stars gained in the trending window reach the threshold.
    pub rising_projects: Vec<DiffEntry>,

    /// Watched projects whose star count moved.
    pub watchlist_changes: Vec<DiffEntry>,
}

/// Compare `today` against `prior`.
///
/// Without a prior snapshot every project is new and nothing can be rising or changed.
/// Each list is ordered by descending stars, then by repository id.
#[must_use]
pub fn diff(today: &Snapshot, prior: Option<&Snapshot>, rising_threshold: u64) -> DiffSummary {
    let mut summary = DiffSummary::default();

    for record in today.records() {
        let Some(before) = prior.and_then(|p| p.get(&record.repo_id)) else {
            summary.new_projects.push(DiffEntry {
                record: record.clone(),
                prior_stars: None,
            });
            continue;
        };

        let entry = || DiffEntry {
            record: record.clone(),
            prior_stars: Some(before.star_count),
        };

        if record.stars_gained_in_window >= rising_threshold {
            summary.rising_projects.push(entry());
        }

        if record.is_watchlisted() && record.star_count != before.star_count {
            summary.watchlist_changes.push(entry());
        }
    }

    for list in [&mut summary.new_projects, &mut summary.rising_projects, &mut summary.watchlist_changes] {
        list.sort_by(|a, b| {
            Reverse(a.record.star_count)
                .cmp(&Reverse(b.record.star_count))
                .then_with(|| a.record.repo_id.cmp(&b.record.repo_id))
        });
    }

    summary
}

/// The first `n` entries of an already ordered list.
#[must_use]
pub fn top_n(list: &[DiffEntry], n: usize) -> &[DiffEntry] {
    list.get(..n).unwrap_or(list)
}
