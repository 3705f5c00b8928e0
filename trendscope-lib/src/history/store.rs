use super::{FirstSeenIndex, Snapshot};
use crate::Result;
use crate::dir_lock::{DirLockGuard, acquire_lock};
use chrono::NaiveDate;
use ohno::{EnrichableExt, IntoAppError};
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOG_TARGET: &str = "   history";

const HISTORY_DIR: &str = "history";
const DAILY_DIR: &str = "daily";
const DATASET_FILE: &str = "projects.json";
const FIRST_SEEN_FILE: &str = "first_seen.json";
const LOCK_FILE: &str = "trendscope.lock";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Day-by-day archive of snapshots and rendered reports under one data directory.
///
/// ```text
/// <data_dir>/
///   projects.json          latest dataset, repo id -> record
///   first_seen.json        earliest sighting of every project, rebuilt from history/ as needed
///   history/<date>.json    one snapshot per run date, never pruned
///   daily/<date>.md        rendered reports, pruned by age
/// ```
///
/// The store holds an exclusive lock on the data directory while it exists.
#[derive(Debug)]
pub struct HistoryStore {
    data_dir: PathBuf,
    _lock: DirLockGuard,
}

impl HistoryStore {
    /// Open (creating if needed) the store rooted at `data_dir`.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();

        for dir in [data_dir.join(HISTORY_DIR), data_dir.join(DAILY_DIR)] {
            fs::create_dir_all(&dir).into_app_err_with(|| format!("unable to create directory '{}'", dir.display()))?;
        }

        let lock = acquire_lock(&data_dir, LOCK_FILE).await?;
        Ok(Self { data_dir, _lock: lock })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(DATASET_FILE)
    }

    #[must_use]
    pub fn first_seen_path(&self) -> PathBuf {
        self.data_dir.join(FIRST_SEEN_FILE)
    }

    #[must_use]
    pub fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(HISTORY_DIR).join(format!("{}.json", date.format(DATE_FORMAT)))
    }

    #[must_use]
    pub fn report_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(DAILY_DIR).join(format!("{}.md", date.format(DATE_FORMAT)))
    }

    /// Archive `snapshot` under its run date, replacing any earlier write for that date.
    ///
    /// The latest dataset file is replaced too, unless a newer date is already archived, and
    /// the first-seen index is updated. All files are staged before any is renamed into place.
    ///
    /// The archive rename is the commit point. If it fails nothing on disk has changed. If a
    /// later rename fails the run is still recorded: the first-seen index catches up from the
    /// archive on the next run, and the dataset is rewritten by the next successful one.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let newest_before_write = self.dates()?.last().copied();
        let mut first_seen = self.first_seen();
        first_seen.record(snapshot);

        let archive_path = self.snapshot_path(snapshot.run_date);
        let archive = stage_json(&archive_path, snapshot)
            .map_err(|e| e.enrich_with(|| format!("unable to write snapshot '{}'", archive_path.display())))?;

        let dataset_path = self.dataset_path();
        let dataset = if newest_before_write.is_none_or(|newest| snapshot.run_date >= newest) {
            Some(
                stage_json(&dataset_path, &snapshot.projects)
                    .map_err(|e| e.enrich_with(|| format!("unable to write dataset '{}'", dataset_path.display())))?,
            )
        } else {
            log::info!(
                target: LOG_TARGET,
                "Leaving '{}' alone: {} is older than the newest archived snapshot",
                DATASET_FILE,
                snapshot.run_date
            );
            None
        };

        let index_path = self.first_seen_path();
        let index = stage_json(&index_path, &first_seen)
            .map_err(|e| e.enrich_with(|| format!("unable to write first-seen index '{}'", index_path.display())))?;

        commit(archive, &archive_path).map_err(|e| e.enrich_with(|| format!("unable to write snapshot '{}'", archive_path.display())))?;
        log::info!(target: LOG_TARGET, "Archived {} project(s) to '{}'", snapshot.len(), archive_path.display());

        if let Some(dataset) = dataset {
            commit(dataset, &dataset_path).map_err(|e| e.enrich_with(|| format!("unable to write dataset '{}'", dataset_path.display())))?;
        }

        if let Err(e) = commit(index, &index_path) {
            log::warn!(target: LOG_TARGET, "Could not update '{}', it will be rebuilt next run: {e:#}", index_path.display());
        }

        Ok(())
    }

    /// Earliest archived sighting of every project.
    ///
    /// Starts from the saved index and folds in any archived snapshot it has not seen yet.
    /// A missing or unreadable index is rebuilt from the archive. Unreadable snapshots are
    /// skipped with a warning.
    #[must_use]
    pub fn first_seen(&self) -> FirstSeenIndex {
        let mut index = self.load_first_seen();

        let dates = match self.dates() {
            Ok(dates) => dates,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not list snapshot history: {e:#}");
                return index;
            }
        };

        for date in dates {
            if index.is_covered(date) {
                continue;
            }
            match self.read(date) {
                Ok(Some(snapshot)) => {
                    log::debug!(target: LOG_TARGET, "Adding snapshot for {date} to the first-seen index");
                    index.record(&snapshot);
                }
                Ok(None) => {}
                Err(e) => log::warn!(target: LOG_TARGET, "Ignoring snapshot for {date} when looking up first-seen dates: {e:#}"),
            }
        }

        index
    }

    fn load_first_seen(&self) -> FirstSeenIndex {
        let path = self.first_seen_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return FirstSeenIndex::default(),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read '{}', rebuilding it: {e}", path.display());
                return FirstSeenIndex::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!(target: LOG_TARGET, "Could not parse '{}', rebuilding it: {e}", path.display());
            FirstSeenIndex::default()
        })
    }

    /// The snapshot archived for exactly `date`.
    pub fn read(&self, date: NaiveDate) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(date);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to read snapshot '{}'", path.display())),
        };

        let snapshot = serde_json::from_str(&text).into_app_err_with(|| format!("unable to parse snapshot '{}'", path.display()))?;
        Ok(Some(snapshot))
    }

    /// The newest snapshot archived strictly before `date`.
    ///
    /// Unreadable history counts as no history.
    #[must_use]
    pub fn read_latest_before(&self, date: NaiveDate) -> Option<Snapshot> {
        let dates = match self.dates() {
            Ok(dates) => dates,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not list snapshot history: {e:#}");
                return None;
            }
        };

        let prior_date = dates.into_iter().rev().find(|d| *d < date)?;
        match self.read(prior_date) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Ignoring prior snapshot for {prior_date}: {e:#}");
                None
            }
        }
    }

    /// Every archived run date, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = dated_files(&self.data_dir.join(HISTORY_DIR), "json")?
            .into_iter()
            .map(|(date, _)| date)
            .collect::<Vec<_>>();
        dates.sort_unstable();
        Ok(dates)
    }

    /// Store a rendered report for `date`, replacing any earlier one.
    pub fn write_report(&self, date: NaiveDate, markdown: &str) -> Result<PathBuf> {
        let path = self.report_path(date);
        fs::write(&path, markdown).into_app_err_with(|| format!("unable to write report '{}'", path.display()))?;
        Ok(path)
    }

    /// Delete reports dated more than `retention_days` before `today`. Returns how many went.
    pub fn prune_reports(&self, retention_days: u32, today: NaiveDate) -> Result<usize> {
        let Some(cutoff) = today.checked_sub_days(chrono::Days::new(u64::from(retention_days))) else {
            return Ok(0);
        };

        let mut removed = 0;
        for (date, path) in dated_files(&self.data_dir.join(DAILY_DIR), "md")? {
            if date < cutoff {
                fs::remove_file(&path).into_app_err_with(|| format!("unable to delete old report '{}'", path.display()))?;
                log::debug!(target: LOG_TARGET, "Deleted old report '{}'", path.display());
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Files in `dir` named `<YYYY-MM-DD>.<extension>`. Other entries are ignored.
fn dated_files(dir: &Path, extension: &str) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).into_app_err_with(|| format!("unable to list '{}'", dir.display())),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.into_app_err_with(|| format!("unable to list '{}'", dir.display()))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }

        let date = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());

        if let Some(date) = date {
            files.push((date, path));
        }
    }

    Ok(files)
}

/// Write JSON to a temporary file next to `path`. Dropping the result discards it.
fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp_file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    Ok(temp_file)
}

/// Rename a staged file into place so readers never see a partial file.
fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    let _ = staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}
