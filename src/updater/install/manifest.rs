//! Component manifest handling.
//!
//! The manifest is a JSON object with at least a `version` string. Fields the
//! updater does not know about are preserved when the version is stamped.

use crate::core::InstallError;
use crate::updater::version::SemanticVersion;
use crate::utils::atomic_write;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Parse a manifest file into its JSON object.
///
/// # Errors
///
/// Returns [`InstallError::InvalidManifest`] if the file cannot be read or is
/// not a JSON object.
pub fn read_manifest(path: &Path) -> Result<Map<String, Value>, InstallError> {
    let content = fs::read_to_string(path)
        .map_err(|e| InstallError::InvalidManifest(format!("{}: {e}", path.display())))?;
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InstallError::InvalidManifest(format!(
            "{}: expected a JSON object",
            path.display()
        ))),
        Err(e) => Err(InstallError::InvalidManifest(format!("{}: {e}", path.display()))),
    }
}

/// The raw `version` string of a manifest, if it has one.
///
/// # Errors
///
/// Returns [`InstallError::InvalidManifest`] if the manifest cannot be parsed.
pub fn manifest_version(path: &Path) -> Result<Option<String>, InstallError> {
    Ok(read_manifest(path)?.get("version").and_then(Value::as_str).map(str::to_string))
}

/// Check the staged tree holds every required file and that each of them
/// came from the payload.
///
/// # Errors
///
/// Returns [`InstallError::MissingRequiredFiles`] naming the files the release
/// did not ship.
pub fn check_required_files(
    staging: &Path,
    supplied: &BTreeSet<PathBuf>,
    required: &[String],
) -> Result<(), InstallError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| {
            let rel = Path::new(name.as_str());
            !supplied.contains(rel) || !staging.join(rel).is_file()
        })
        .cloned()
        .collect();

    if missing.is_empty() { Ok(()) } else { Err(InstallError::MissingRequiredFiles(missing)) }
}

/// Validate the staged manifest against the version being installed.
///
/// A differing version is only logged; the stamp step overwrites it.
///
/// # Errors
///
/// Returns [`InstallError::InvalidManifest`] if the manifest does not parse.
pub fn check_manifest(path: &Path, target: &SemanticVersion) -> Result<(), InstallError> {
    let manifest = read_manifest(path)?;
    let declared = manifest.get("version").and_then(Value::as_str);
    let matches = declared
        .and_then(|v| SemanticVersion::parse_tag(v).ok())
        .is_some_and(|v| &v == target);
    if !matches {
        warn!(
            "Manifest declares version {} but installing {}",
            declared.unwrap_or("<none>"),
            target
        );
    }
    Ok(())
}

/// Rewrite the manifest's `version` field to `version`.
///
/// # Errors
///
/// Returns [`InstallError::InvalidManifest`] if the manifest cannot be parsed
/// or written back.
pub fn stamp_version(path: &Path, version: &SemanticVersion) -> Result<(), InstallError> {
    let mut manifest = read_manifest(path)?;
    manifest.insert("version".to_string(), Value::String(version.to_string()));

    let mut content = serde_json::to_string_pretty(&Value::Object(manifest))
        .map_err(|e| InstallError::InvalidManifest(e.to_string()))?;
    content.push('\n');

    atomic_write(path, content.as_bytes())
        .map_err(|e| InstallError::InvalidManifest(format!("{e:#}")))
}
