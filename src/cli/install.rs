use super::common::{load_config, reloader};
use super::update::report;
use crate::updater::{ComponentUpdater, SemanticVersion};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Install a release archive from disk, skipping the registry.
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Release archive (.zip)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Version the archive contains, e.g. 2.3.0 or v2.3.0
    #[arg(long, value_name = "VERSION")]
    pub version: String,
}

impl InstallCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let version = SemanticVersion::parse_tag(&self.version)
            .with_context(|| format!("Invalid version '{}'", self.version))?;
        if !self.archive.is_file() {
            anyhow::bail!("Archive not found: {}", self.archive.display());
        }

        let updater = ComponentUpdater::from_config(&config, reloader(&config)?);
        println!("{}", format!("Installing {} from {}...", version, self.archive.display()).cyan());
        report(updater.apply(&self.archive, &version).await)
    }
}
