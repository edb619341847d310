use super::common::load_config;
use crate::updater::{Installer, ReleaseClient};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Show installed and latest versions and any leftover working directories.
#[derive(Args, Debug)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let installer = Installer::from_config(&config, None);
        let paths = installer.paths();

        println!("{}: {}", "Component".bold(), config.component.id);
        println!("{}: {}", "Live tree".bold(), paths.live.display());

        match installer.live_version() {
            Ok(version) => println!("{}: {}", "Installed".bold(), version),
            Err(e) => println!("{}: {}", "Installed".bold(), format!("unknown ({e})").yellow()),
        }

        match ReleaseClient::new(&config.source).fetch_latest().await {
            Ok(info) => println!("{}: {} ({})", "Latest".bold(), info.version, info.tag),
            Err(e) => {
                debug!("Latest release lookup failed: {}", e);
                println!("{}: {}", "Latest".bold(), format!("unavailable ({e})").yellow());
            }
        }

        print_dir("Backup", &paths.backup, false);
        print_dir("Staging", &paths.staging, true);
        print_dir("Previous", &paths.old, true);
        Ok(())
    }
}

/// Staging and `.old` only survive an interrupted install, so flag them.
fn print_dir(label: &str, path: &Path, leftover: bool) {
    if !path.is_dir() {
        return;
    }
    let line = format!("{label}: {}", path.display());
    if leftover {
        println!("{} {}", line.yellow(), "(left over from an interrupted install)".yellow());
    } else {
        println!("{line}");
    }
}
