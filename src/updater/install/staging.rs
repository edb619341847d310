//! Staging tree preparation.

use crate::core::InstallError;
use crate::utils::{copy_dir, remove_dir_all};
use glob::Pattern;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Glob patterns matched against every component of a relative path.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    /// Compile the patterns, skipping (with a warning) any that are invalid.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Pattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid exclude pattern '{}': {}", p.as_ref(), e);
                    None
                }
            })
            .collect();
        Self {
            patterns,
        }
    }

    /// Whether any component of `rel` matches a pattern.
    #[must_use]
    pub fn is_excluded(&self, rel: &Path) -> bool {
        rel.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.patterns.iter().any(|p| p.matches(&name))
        })
    }
}

/// Build `staging` from a copy of `live` with `payload` laid over it.
///
/// Any stale staging tree is removed first. Returns the relative paths of
/// the files the payload supplied. On failure the staging tree is removed.
///
/// # Errors
///
/// Returns [`InstallError::Staging`] if any copy fails.
pub fn prepare_staging(
    live: &Path,
    payload: &Path,
    staging: &Path,
    excludes: &ExcludeSet,
) -> Result<BTreeSet<PathBuf>, InstallError> {
    remove_dir_all(staging).map_err(|e| InstallError::Staging(format!("{e:#}")))?;

    let result = copy_dir(live, staging)
        .map_err(|e| InstallError::Staging(format!("{e:#}")))
        .and_then(|()| overlay(payload, staging, excludes));

    if result.is_err()
        && let Err(e) = remove_dir_all(staging)
    {
        warn!("Failed to remove staging tree {}: {:#}", staging.display(), e);
    }
    result
}

/// Copy every non-excluded file from `payload` into `staging`, replacing
/// files that exist and keeping the rest.
fn overlay(
    payload: &Path,
    staging: &Path,
    excludes: &ExcludeSet,
) -> Result<BTreeSet<PathBuf>, InstallError> {
    let mut supplied = BTreeSet::new();

    let walker = WalkDir::new(payload).min_depth(1).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        e.path().strip_prefix(payload).map_or(true, |rel| !excludes.is_excluded(rel))
    }) {
        let entry = entry.map_err(|e| InstallError::Staging(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(payload)
            .map_err(|e| InstallError::Staging(e.to_string()))?
            .to_path_buf();
        let target = staging.join(&rel);

        if entry.file_type().is_dir() {
            if target.is_file() {
                fs::remove_file(&target).map_err(|e| staging_io(&target, &e))?;
            }
            fs::create_dir_all(&target).map_err(|e| staging_io(&target, &e))?;
        } else if entry.file_type().is_file() {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|e| staging_io(&target, &e))?;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| staging_io(parent, &e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| staging_io(&target, &e))?;
            supplied.insert(rel);
        }
    }

    debug!("Overlaid {} files onto {}", supplied.len(), staging.display());
    Ok(supplied)
}

fn staging_io(path: &Path, err: &std::io::Error) -> InstallError {
    InstallError::Staging(format!("{}: {err}", path.display()))
}
