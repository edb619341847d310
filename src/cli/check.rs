use super::common::load_config;
use crate::updater::{Installer, ReleaseClient, should_update};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Compare the installed version with the latest release.
#[derive(Args, Debug)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let installer = Installer::from_config(&config, None);
        let current = installer.live_version()?;

        println!("{}", "Checking for updates...".cyan());
        let latest = ReleaseClient::new(&config.source).fetch_latest().await?;

        if should_update(&current, &latest.version) {
            println!(
                "{}",
                format!("Update available: {} -> {}", current, latest.version).green()
            );
            println!("Run `component-updater update` to install it");
        } else {
            println!("{}", format!("{} is up to date ({})", config.component.id, current).green());
        }
        Ok(())
    }
}
