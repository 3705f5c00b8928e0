//! Advisory locking of a directory shared between concurrent runs.

use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "      lock";

/// Holds an exclusive lock on a directory until dropped.
#[derive(Debug)]
pub struct DirLockGuard(File);

impl Drop for DirLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not release directory lock: {e:#}");
        }
    }
}

/// Take an exclusive lock on `dir`, waiting for any other holder to release it.
///
/// The lock is an advisory lock on `dir/file_name`, which is created if needed.
pub async fn acquire_lock(dir: &Path, file_name: &str) -> Result<DirLockGuard> {
    let lock_path = dir.join(file_name);

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening lock file '{}'", lock_path.display()))?;

    // May block for as long as another run holds the lock
    let file = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("acquiring exclusive lock '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired lock '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(DirLockGuard(file))
}
