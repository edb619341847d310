//! component-updater entry point
//!
//! Parses the command line, runs the command and reports failures with
//! suggestions. See [`component_updater::cli`] for the commands.

use anyhow::Result;
use clap::Parser;
use component_updater::cli;
use component_updater::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
