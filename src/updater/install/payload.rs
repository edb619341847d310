//! Archive extraction and payload discovery.

use crate::core::InstallError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extract a zip archive into `dest`.
///
/// Entry names are sanitized by the zip crate; entries that would escape
/// `dest` are rejected.
///
/// # Errors
///
/// Returns [`InstallError::CorruptArchive`] if the archive cannot be opened or
/// any entry cannot be extracted.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), InstallError> {
    let file = fs::File::open(archive)
        .map_err(|e| InstallError::CorruptArchive(format!("{}: {e}", archive.display())))?;
    let mut zip =
        zip::ZipArchive::new(file).map_err(|e| InstallError::CorruptArchive(e.to_string()))?;

    debug!("Extracting {} entries to {}", zip.len(), dest.display());
    zip.extract(dest).map_err(|e| InstallError::CorruptArchive(e.to_string()))
}

/// How a component sits inside release archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLayout {
    pub component_id: String,
    pub plugin_dir: String,
    pub manifest_file: String,
}

/// Find the component root inside an extracted archive.
///
/// Candidates holding the manifest, first match wins:
///
/// 1. `<root>/<plugin_dir>/<component_id>`
/// 2. `<top>/<plugin_dir>/<component_id>` where `<top>`'s lowercased name
///    contains the component id (GitHub source archives are named
///    `<repo>-<tag>`)
/// 3. `<top>` holding the manifest directly
/// 4. `<top>/<component_id>`
///
/// When none of them holds a manifest, an existing directory from rule 1 or 2
/// is still returned so validation can report which required files the
/// release lacks. Top-level directories are tried in name order.
///
/// # Errors
///
/// Returns [`InstallError::PayloadNotFound`] when nothing matches.
pub fn locate_payload(root: &Path, layout: &PayloadLayout) -> Result<PathBuf, InstallError> {
    let top_level = top_level_dirs(root)?;
    let id_lower = layout.component_id.to_lowercase();
    let plugin_root = |dir: &Path| dir.join(&layout.plugin_dir).join(&layout.component_id);

    let conventional: Vec<PathBuf> = std::iter::once(plugin_root(root))
        .chain(
            top_level
                .iter()
                .filter(|dir| {
                    dir.file_name()
                        .is_some_and(|n| n.to_string_lossy().to_lowercase().contains(&id_lower))
                })
                .map(|dir| plugin_root(dir)),
        )
        .collect();

    let with_manifest = conventional
        .iter()
        .cloned()
        .chain(top_level.iter().cloned())
        .chain(top_level.iter().map(|dir| dir.join(&layout.component_id)))
        .find(|dir| dir.join(&layout.manifest_file).is_file());

    if let Some(payload) = with_manifest {
        debug!("Payload root: {}", payload.display());
        return Ok(payload);
    }

    match conventional.into_iter().find(|dir| dir.is_dir()) {
        Some(payload) => {
            debug!("Payload root without {}: {}", layout.manifest_file, payload.display());
            Ok(payload)
        }
        None => Err(InstallError::PayloadNotFound),
    }
}

fn top_level_dirs(root: &Path) -> Result<Vec<PathBuf>, InstallError> {
    let entries = fs::read_dir(root).map_err(|e| InstallError::CorruptArchive(e.to_string()))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}
