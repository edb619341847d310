use crate::config::UpdaterConfig;
use crate::updater::{CommandReloader, ComponentReloader};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Load and validate the config file.
pub async fn load_config(path: Option<PathBuf>) -> Result<UpdaterConfig> {
    let config = UpdaterConfig::load_with_optional(path).await?;
    config.validate()?;
    debug!("Managing {} at {}", config.component.id, config.live_root().display());
    Ok(config)
}

/// The reloader configured under `[install]`, if reloads are enabled.
pub fn reloader(config: &UpdaterConfig) -> Result<Option<Arc<dyn ComponentReloader>>> {
    if !config.install.auto_reload {
        return Ok(None);
    }
    if config.install.reload_command.is_empty() {
        warn!("install.auto_reload is on but install.reload_command is empty; updates will wait for a host restart");
        return Ok(None);
    }
    let reloader = CommandReloader::new(&config.install.reload_command)?;
    Ok(Some(Arc::new(reloader)))
}
