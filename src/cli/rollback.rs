use super::common::load_config;
use crate::updater::Installer;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Restore the live tree from `<live>.backup`.
#[derive(Args, Debug)]
pub struct RollbackCommand {}

impl RollbackCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let installer = Installer::from_config(&config, None);

        println!("{}", "Restoring from backup...".yellow());
        installer.restore_backup().await.context("Failed to restore from backup")?;

        match installer.live_version() {
            Ok(version) => println!("{}", format!("Restored version {version}").green()),
            Err(_) => println!("{}", "Restored from backup".green()),
        }
        println!("Restart or reload the host to load the restored tree");
        Ok(())
    }
}
