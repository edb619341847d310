use super::common::{load_config, reloader};
use crate::updater::{ComponentUpdater, CycleOutcome, UpdateCycle};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Run one update cycle now.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Reinstall the latest release even if it is not newer
    #[arg(long)]
    pub force: bool,
}

impl UpdateCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let updater = ComponentUpdater::from_config(&config, reloader(&config)?).force(self.force);

        println!("{}", "Checking for updates...".cyan());
        report(updater.run_cycle().await)
    }
}

/// Print a cycle outcome; failures become errors.
pub fn report(outcome: CycleOutcome) -> Result<()> {
    match &outcome {
        CycleOutcome::UpToDate => println!("{}", "Already on the latest version".green()),
        CycleOutcome::Updated(v) => println!("{}", format!("Updated to {v}").green()),
        CycleOutcome::RestartRequired(v) => {
            println!("{}", format!("Installed {v}").green());
            println!("{}", "Restart the host to load the new version".yellow());
        }
        CycleOutcome::RolledBack { .. }
        | CycleOutcome::Failed { .. }
        | CycleOutcome::Irrecoverable { .. } => bail!("{outcome}"),
    }
    Ok(())
}
