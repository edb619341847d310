//! Live component updater.
//!
//! The updater keeps a plugin component's source tree (the *live tree*) at
//! the latest published release while the host that loads it keeps running.
//! Stages, leaf to root:
//!
//! - [`release`] asks the registry for the latest release ([`ReleaseClient`])
//! - [`version`] compares it with the installed version ([`should_update`])
//! - [`fetch`] and [`verification`] download and verify the archive
//! - [`install`] stages, swaps, reloads and rolls back ([`Installer`])
//! - [`host`] is the boundary to the host process (reload, notifications)
//! - [`cycle`] ties one pass together ([`ComponentUpdater`])
//! - [`scheduler`] and [`state`] run cycles in the background with retries
//!
//! # Example
//!
//! ```rust,no_run
//! use component_updater::config::UpdaterConfig;
//! use component_updater::updater::{ComponentUpdater, UpdateScheduler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load_with_optional(None).await?;
//! config.validate()?;
//!
//! let updater = Arc::new(ComponentUpdater::from_config(&config, None));
//! let scheduler = UpdateScheduler::new(updater, config.schedule.policy());
//! scheduler.run(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cycle;
pub mod fetch;
pub mod host;
pub mod install;
pub mod release;
pub mod scheduler;
pub mod state;
pub mod verification;
pub mod version;

pub use config::SchedulePolicy;
pub use cycle::{ComponentUpdater, CycleOutcome, UpdateCycle};
pub use fetch::ArchiveFetcher;
pub use host::{
    CommandReloader, ComponentReloader, HostRegistry, LogNotifier, Notice, Notifier,
    ReadinessGate, RegistrationState, WebhookNotifier,
};
pub use install::{InstallOutcome, InstallPaths, Installer, RollbackSource};
pub use release::{ReleaseClient, VersionInfo};
pub use scheduler::UpdateScheduler;
pub use state::{CheckKind, SchedulerPhase, SchedulerState, UpdateAttempt};
pub use verification::ChecksumVerifier;
pub use version::{SemanticVersion, should_update};
