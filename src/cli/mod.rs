//! Command-line interface.
//!
//! # Commands
//!
//! - `check` - Ask the registry for the latest release and compare
//! - `status` - Show installed and latest versions plus leftover working dirs
//! - `update` - Run one update cycle now
//! - `install` - Install a local release archive
//! - `rollback` - Restore the live tree from its backup
//! - `run` - Keep the component updated in the background until Ctrl-C
//!
//! # Global Options
//!
//! - `--config <PATH>` - Config file (also `COMPONENT_UPDATER_CONFIG`)
//! - `--verbose` - Debug logging
//! - `--quiet` - Warnings and errors only
//!
//! `RUST_LOG` overrides both logging flags.
//!
//! ```bash
//! component-updater --config /etc/component-updater.toml check
//! component-updater update --force
//! component-updater install ./ble_bridge-2.3.0.zip --version 2.3.0
//! component-updater run
//! ```

mod check;
mod common;
mod install;
mod rollback;
mod run;
mod status;
mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// Config file given with `--config`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber. Safe to call more than once.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "component-updater",
    about = "Keep a live plugin component at its latest release",
    version,
    long_about = "Polls a release registry for a component, installs new releases through a staged swap, asks the host to reload and rolls back when it refuses."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file
    #[arg(long, global = true, env = "COMPONENT_UPDATER_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a newer release is available
    Check(check::CheckCommand),

    /// Show installed and latest versions
    Status(status::StatusCommand),

    /// Download and install the latest release now
    Update(update::UpdateCommand),

    /// Install a release archive from disk
    Install(install::InstallCommand),

    /// Restore the live tree from the backup taken before the last install
    Rollback(rollback::RollbackCommand),

    /// Run the background updater until interrupted
    Run(run::RunCommand),
}

impl Cli {
    /// Parse flags, initialize logging and run the command.
    ///
    /// # Errors
    ///
    /// Returns the command's error for `main` to report.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "component_updater=debug,info"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Run the command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let path = config.config_path;
        match self.command {
            Commands::Check(cmd) => cmd.execute(path).await,
            Commands::Status(cmd) => cmd.execute(path).await,
            Commands::Update(cmd) => cmd.execute(path).await,
            Commands::Install(cmd) => cmd.execute(path).await,
            Commands::Rollback(cmd) => cmd.execute(path).await,
            Commands::Run(cmd) => cmd.execute(path).await,
        }
    }
}
