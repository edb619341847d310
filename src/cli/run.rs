use super::common::{load_config, reloader};
use crate::updater::{ComponentUpdater, UpdateScheduler};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the scheduler until Ctrl-C.
#[derive(Args, Debug)]
pub struct RunCommand {}

impl RunCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let updater = Arc::new(ComponentUpdater::from_config(&config, reloader(&config)?));
        let scheduler = UpdateScheduler::new(updater, config.schedule.policy());

        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current cycle");
                    signal_cancel.cancel();
                }
                Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
            }
        });

        let state = scheduler.run(cancel).await;
        if let Some(attempt) = state.last_attempt {
            info!(
                "Last attempt: {} at {} ({})",
                attempt.target_version, attempt.started_at, attempt.outcome
            );
        }
        Ok(())
    }
}
