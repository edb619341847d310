//! The rename-based swap and its inverse.
//!
//! All three trees are siblings of the live root, so every rename here stays
//! on one filesystem and is atomic.

use super::{InstallPaths, RollbackSource};
use crate::constants::ROLLBACK_RENAME_ATTEMPTS;
use crate::core::InstallError;
use crate::utils::backoff::retry_blocking;
use crate::utils::{copy_dir, remove_dir_all};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{error, info, warn};

/// Move the staging tree into place, keeping the previous live tree at
/// `.old`.
///
/// # Errors
///
/// See [`swap_in_with`].
pub fn swap_in(paths: &InstallPaths) -> Result<(), InstallError> {
    swap_in_with(paths, |from, to| fs::rename(from, to))
}

/// [`swap_in`] with an injectable rename.
///
/// # Errors
///
/// - [`InstallError::SwapFailed`] if either rename fails and the original live
///   tree was put back (staging is removed)
/// - [`InstallError::IrrecoverableState`] if putting it back failed too
pub fn swap_in_with<F>(paths: &InstallPaths, mut rename: F) -> Result<(), InstallError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    if let Err(e) = remove_dir_all(&paths.old) {
        discard_staging(paths);
        return Err(InstallError::SwapFailed(format!("cannot clear {}: {e:#}", paths.old.display())));
    }

    if let Err(e) = rename(&paths.live, &paths.old) {
        discard_staging(paths);
        return Err(InstallError::SwapFailed(format!(
            "cannot move {} aside: {e}",
            paths.live.display()
        )));
    }

    if let Err(e) = rename(&paths.staging, &paths.live) {
        warn!("Swap failed ({}), restoring previous tree", e);
        let restored =
            retry_blocking(ROLLBACK_RENAME_ATTEMPTS, || rename(&paths.old, &paths.live));
        return match restored {
            Ok(()) => {
                discard_staging(paths);
                Err(InstallError::SwapFailed(e.to_string()))
            }
            Err(restore_err) => {
                error!(
                    "Cannot restore {} from {}: {}",
                    paths.live.display(),
                    paths.old.display(),
                    restore_err
                );
                Err(InstallError::IrrecoverableState(format!(
                    "swap failed ({e}) and restoring {} failed ({restore_err})",
                    paths.old.display()
                )))
            }
        };
    }

    info!("Swapped new tree into {}", paths.live.display());
    Ok(())
}

/// Drop the previous tree once the new one is accepted.
pub fn discard_old(paths: &InstallPaths) {
    if let Err(e) = remove_dir_all(&paths.old) {
        warn!("Failed to remove {}: {:#}", paths.old.display(), e);
    }
}

/// Put the previous tree back after a failed reload.
///
/// Prefers the `.old` tree from the swap and falls back to the `.backup`
/// copy when `.old` is gone.
///
/// # Errors
///
/// Returns [`InstallError::IrrecoverableState`] when neither source could be
/// restored.
pub fn roll_back(paths: &InstallPaths) -> Result<RollbackSource, InstallError> {
    if let Err(e) = remove_dir_all(&paths.live) {
        return Err(InstallError::IrrecoverableState(format!(
            "cannot remove rejected tree {}: {e:#}",
            paths.live.display()
        )));
    }

    if paths.old.is_dir() {
        match retry_blocking(ROLLBACK_RENAME_ATTEMPTS, || fs::rename(&paths.old, &paths.live)) {
            Ok(()) => {
                info!("Rolled back {} from {}", paths.live.display(), paths.old.display());
                return Ok(RollbackSource::PreviousTree);
            }
            Err(e) => warn!("Cannot restore from {}: {}", paths.old.display(), e),
        }
    }

    if paths.backup.is_dir() {
        return match copy_dir(&paths.backup, &paths.live) {
            Ok(()) => {
                info!("Rolled back {} from {}", paths.live.display(), paths.backup.display());
                Ok(RollbackSource::Backup)
            }
            Err(e) => Err(InstallError::IrrecoverableState(format!(
                "restoring from {} failed: {e:#}",
                paths.backup.display()
            ))),
        };
    }

    Err(InstallError::IrrecoverableState(format!(
        "nothing to restore {} from",
        paths.live.display()
    )))
}

fn discard_staging(paths: &InstallPaths) {
    if let Err(e) = remove_dir_all(&paths.staging) {
        warn!("Failed to remove {}: {:#}", paths.staging.display(), e);
    }
}
