//! Safety utilities to prevent accidental data loss.
//!
//! A session that deletes rows starts from a copy of the database. The copy
//! must never land on top of the source or an earlier backup.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Validates that a backup path is safe to write.
///
/// Checks:
/// - Filename must contain "backup"
/// - Backup cannot be the source database
/// - Backup must not already exist
pub fn validate_backup_path(backup: &Path, source: &Path) -> Result<()> {
    let backup_name = backup.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !backup_name.contains("backup") {
        bail!(
            "Safety check failed: backup file '{}' must contain 'backup' in the name",
            backup.display()
        );
    }

    if backup == source {
        bail!(
            "Safety check failed: backup '{}' cannot be the same as source '{}'",
            backup.display(),
            source.display()
        );
    }

    if backup.exists() {
        bail!(
            "Safety check failed: backup '{}' already exists",
            backup.display()
        );
    }

    Ok(())
}

/// `<dir>/<stem>.backup-<secs>.sqlite3` next to the source database.
pub fn backup_path_for(source: &Path, unix_secs: u64) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("database");
    source.with_file_name(format!("{}.backup-{}.sqlite3", stem, unix_secs))
}

/// Copy `source` to a timestamped backup and return the backup path.
pub fn backup_database(source: &Path) -> Result<PathBuf> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before 1970")?
        .as_secs();
    let backup = backup_path_for(source, secs);
    validate_backup_path(&backup, source)?;

    let bytes = fs::copy(source, &backup)
        .with_context(|| format!("Failed to back up {} to {}", source.display(), backup.display()))?;
    info!(path = %backup.display(), bytes, "database backed up");
    Ok(backup)
}
