//! The `.backup` copy of the live tree.
//!
//! A backup is taken at the start of every install and kept afterwards, so the
//! last known-good tree can be restored by hand (`component-updater rollback`)
//! or automatically when the `.old` tree is gone during a rollback.

use super::InstallPaths;
use crate::utils::{copy_dir, remove_dir_all};
use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Replace any previous backup with a fresh copy of the live tree.
///
/// # Errors
///
/// Returns an error if the old backup cannot be removed or the copy fails.
/// Install callers log this and carry on.
pub fn create_backup(paths: &InstallPaths) -> Result<()> {
    remove_dir_all(&paths.backup).context("Failed to remove stale backup")?;
    copy_dir(&paths.live, &paths.backup).with_context(|| {
        format!("Failed to back up {} to {}", paths.live.display(), paths.backup.display())
    })?;
    debug!("Backed up live tree to {}", paths.backup.display());
    Ok(())
}

/// Replace the live tree with a copy of the backup.
///
/// The backup itself is left in place.
///
/// # Errors
///
/// Returns an error if there is no backup or any filesystem step fails.
pub fn restore_from_backup(paths: &InstallPaths) -> Result<()> {
    if !paths.backup.is_dir() {
        bail!("No backup found at {}", paths.backup.display());
    }

    remove_dir_all(&paths.live).context("Failed to remove live tree before restore")?;
    copy_dir(&paths.backup, &paths.live).with_context(|| {
        format!("Failed to restore {} from {}", paths.live.display(), paths.backup.display())
    })?;

    info!("Restored {} from backup", paths.live.display());
    Ok(())
}
