//! Day-over-day persistence of merged snapshots.
//!
//! Every run archives its [`Snapshot`] under the run date. The diff of a run is computed
//! against the newest snapshot archived before that date, so reruns and backfills of old
//! dates compare against the right predecessor. First-seen dates come from the whole archive
//! instead, so a project that drops out for a few days keeps its original date.

mod first_seen;
mod snapshot;
mod store;

pub use first_seen::FirstSeenIndex;
pub use snapshot::Snapshot;
pub use store::HistoryStore;
