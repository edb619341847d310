//! Live tree and release archive fixtures.

use crate::config::UpdaterConfig;
use crate::updater::install::{Installer, PayloadLayout};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// A temporary `custom_components/<id>` live tree with a manifest and an
/// entry point.
pub struct LiveTree {
    temp_dir: TempDir,
    component_id: String,
    live_root: PathBuf,
}

impl LiveTree {
    pub fn new(component_id: &str, version: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let live_root = temp_dir.path().join("custom_components").join(component_id);
        fs::create_dir_all(&live_root)?;

        let tree = Self {
            temp_dir,
            component_id: component_id.to_string(),
            live_root,
        };
        tree.write("manifest.json", &manifest_json(component_id, version))?;
        tree.write("__init__.py", &format!("# {component_id} {version}\n"))?;
        tree.write("sensor.py", "SENSORS = []\n")?;
        Ok(tree)
    }

    pub fn live_root(&self) -> &Path {
        &self.live_root
    }

    /// Root of the temporary directory; also a convenient place for
    /// config files and archives.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Write a file relative to the live root.
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.live_root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        Ok(fs::read_to_string(self.live_root.join(rel))?)
    }

    /// `version` from the live manifest.
    pub fn manifest_version(&self) -> Result<String> {
        let manifest: serde_json::Value = serde_json::from_str(&self.read("manifest.json")?)?;
        Ok(manifest["version"].as_str().unwrap_or_default().to_string())
    }

    /// An installer for this tree with no reload delay.
    pub fn installer(&self) -> Installer {
        Installer::new(
            &self.live_root,
            PayloadLayout {
                component_id: self.component_id.clone(),
                plugin_dir: "custom_components".to_string(),
                manifest_file: "manifest.json".to_string(),
            },
        )
        .reload_settle(std::time::Duration::ZERO)
    }

    /// A valid configuration pointing at this tree.
    pub fn config(&self, repository: &str, registry_base: &str) -> UpdaterConfig {
        let mut config = UpdaterConfig::default();
        config.source.repository = repository.to_string();
        config.source.registry_base = registry_base.to_string();
        config.source.source_archive_base = registry_base.to_string();
        config.component.id = self.component_id.clone();
        config.component.live_root = self.live_root.clone();
        config.component.instance_id = "test-instance".to_string();
        config.install.reload_settle_secs = 0;
        config
    }

    /// Write `bytes` next to the live tree and return the path.
    pub fn write_archive(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Builds release zip archives in memory.
#[derive(Debug, Default, Clone)]
pub struct ReleaseArchive {
    files: Vec<(String, Vec<u8>)>,
}

impl ReleaseArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// A release laid out as `custom_components/<id>/...` with manifest,
    /// entry point and one module.
    pub fn plugin(component_id: &str, version: &str) -> Self {
        let base = format!("custom_components/{component_id}");
        Self::new()
            .file(&format!("{base}/manifest.json"), &manifest_json(component_id, version))
            .file(&format!("{base}/__init__.py"), &format!("# {component_id} {version}\n"))
            .file(&format!("{base}/sensor.py"), &format!("SENSORS = ['{version}']\n"))
    }

    #[must_use]
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// Drop every entry whose path ends with `suffix`.
    #[must_use]
    pub fn without(mut self, suffix: &str) -> Self {
        self.files.retain(|(path, _)| !path.ends_with(suffix));
        self
    }

    /// Encode as a zip archive.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (path, content) in &self.files {
            writer.start_file(path.as_str(), options).expect("start zip entry");
            writer.write_all(content).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

/// Relative path → SHA-256 of every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).expect("walked path under root").to_path_buf();
            let digest = Sha256::digest(fs::read(e.path()).expect("read snapshot file"));
            (rel, hex::encode(digest))
        })
        .collect()
}

fn manifest_json(component_id: &str, version: &str) -> String {
    serde_json::to_string_pretty(&serde_json::json!({
        "domain": component_id,
        "name": "Test Component",
        "version": version,
    }))
    .expect("serialize manifest")
}
