//! Deduplication of project records by repository id.
//!
//! Records for the same repository are combined pairwise with [`merge_pair`], which is
//! commutative and associative: counters take the maximum, provenance sets take the union,
//! lifecycle dates take the extremes, the newest activity lookup is kept, and descriptive
//! fields come from whichever record
//! ranks highest under a total order (newest fetch first, then source precedence, then
//! content). Because every step is order-independent, records may arrive in any order or
//! in any number of partial batches and still produce the same result.

use super::{ProjectRecord, RepoId};
use core::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Merge records into one record per repository.
#[must_use]
pub fn merge(records: impl IntoIterator<Item = ProjectRecord>) -> BTreeMap<RepoId, ProjectRecord> {
    let mut merged = BTreeMap::new();
    merge_into(&mut merged, records);
    merged
}

/// Fold another batch of records into an existing merged map.
pub fn merge_into(merged: &mut BTreeMap<RepoId, ProjectRecord>, records: impl IntoIterator<Item = ProjectRecord>) {
    for record in records {
        match merged.entry(record.repo_id.clone()) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(record);
            }
            Entry::Occupied(slot) => {
                let (_, existing) = slot.remove_entry();
                let combined = merge_pair(existing, record);
                let _ = merged.insert(combined.repo_id.clone(), combined);
            }
        }
    }
}

/// Combine two records describing the same repository.
#[must_use]
pub fn merge_pair(a: ProjectRecord, b: ProjectRecord) -> ProjectRecord {
    debug_assert_eq!(a.repo_id, b.repo_id);

    let (mut winner, loser) = if descriptive_rank(&a, &b) == Ordering::Less { (b, a) } else { (a, b) };

    winner.star_count = winner.star_count.max(loser.star_count);
    winner.stars_gained_in_window = winner.stars_gained_in_window.max(loser.stars_gained_in_window);
    winner.forks = winner.forks.max(loser.forks);
    winner.first_seen_date = winner.first_seen_date.min(loser.first_seen_date);
    winner.last_seen_date = winner.last_seen_date.max(loser.last_seen_date);
    winner.activity = winner.activity.take().max(loser.activity);
    winner.sources.extend(loser.sources);
    winner.matched_keywords.extend(loser.matched_keywords);

    winner
}

/// Total order deciding which record supplies descriptive fields. Greater wins.
fn descriptive_rank(a: &ProjectRecord, b: &ProjectRecord) -> Ordering {
    a.fetched_at
        .cmp(&b.fetched_at)
        .then_with(|| a.described_by.precedence().cmp(&b.described_by.precedence()))
        .then_with(|| a.described_by.cmp(&b.described_by))
        .then_with(|| a.repo_id.as_str().cmp(b.repo_id.as_str()))
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.description.cmp(&b.description))
        .then_with(|| a.primary_language.cmp(&b.primary_language))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.topics.cmp(&b.topics))
        .then_with(|| a.license.cmp(&b.license))
        .then_with(|| a.updated_at.cmp(&b.updated_at))
}
