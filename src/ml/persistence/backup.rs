use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ml::StoreError;

const BACKUP_PREFIX: &str = "backup_";

/// Snapshot every file of `models_dir` into a new timestamped folder under `backup_dir`
pub fn create_backup(models_dir: &Path, backup_dir: &Path) -> Result<PathBuf, StoreError> {
    create_backup_at(models_dir, backup_dir, Utc::now())
}

pub fn create_backup_at(
    models_dir: &Path,
    backup_dir: &Path,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let target = backup_dir.join(format!(
        "{}{}",
        BACKUP_PREFIX,
        timestamp.format("%Y-%m-%d_%H-%M-%S")
    ));
    fs::create_dir_all(&target).map_err(|e| StoreError::io(&target, e))?;

    let entries = fs::read_dir(models_dir).map_err(|e| StoreError::io(models_dir, e))?;
    let mut copied = 0;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(models_dir, e))?;
        let path = entry.path();
        if path.is_file() {
            let dest = target.join(entry.file_name());
            fs::copy(&path, &dest).map_err(|e| StoreError::io(&dest, e))?;
            copied += 1;
        }
    }

    info!("Backup created: {} ({} files)", target.display(), copied);
    Ok(target)
}

/// Delete the oldest snapshots until at most `max_to_keep` remain
pub fn remove_old_backups(backup_dir: &Path, max_to_keep: usize) -> Result<Vec<PathBuf>, StoreError> {
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir).map_err(|e| StoreError::io(backup_dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(backup_dir, e))?;
        let is_backup = entry.file_name().to_string_lossy().starts_with(BACKUP_PREFIX);
        if is_backup && entry.path().is_dir() {
            backups.push(entry.path());
        }
    }
    // Names embed the timestamp, so lexical order is chronological
    backups.sort();

    let excess = backups.len().saturating_sub(max_to_keep);
    let mut removed = Vec::with_capacity(excess);
    for path in backups.into_iter().take(excess) {
        fs::remove_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        info!("Deleted old backup: {}", path.display());
        removed.push(path);
    }

    Ok(removed)
}
