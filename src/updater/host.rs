//! Boundary to the host process that loads the component.
//!
//! The updater never talks to the host directly. After a swap it asks a
//! [`ComponentReloader`] to reload the component, and it reports what
//! happened through a [`Notifier`]. Both are traits so the service can run
//! next to any host: [`CommandReloader`] shells out to a supervisor,
//! [`ReadinessGate`] adapts a host that exposes its registration state, and
//! [`LogNotifier`]/[`WebhookNotifier`] cover the usual notification sinks.

use crate::constants::{HOST_READY_WAIT, INSTANCE_ID_ENV};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reloads the component after its tree has been replaced.
#[async_trait]
pub trait ComponentReloader: Send + Sync {
    /// Reload the component instance.
    ///
    /// `Ok(true)` means the host is running the new tree. `Ok(false)` and
    /// `Err` both make the installer roll back.
    async fn reload_component(&self, instance_id: &str) -> Result<bool>;
}

/// How the host currently holds a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Loaded,
    SetupInProgress,
    NotLoaded,
    Missing,
}

/// A host that can report on and reload component instances.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    async fn registration_state(&self, instance_id: &str) -> Result<RegistrationState>;

    async fn reload(&self, instance_id: &str) -> Result<bool>;
}

/// Reloads through a [`HostRegistry`], but only once the instance is loaded.
///
/// An instance still setting up gets one grace period to finish. Anything
/// other than [`RegistrationState::Loaded`] after that is reported as a
/// failed reload.
#[derive(Debug)]
pub struct ReadinessGate<H> {
    host: H,
    ready_wait: Duration,
}

impl<H: HostRegistry> ReadinessGate<H> {
    pub const fn new(host: H) -> Self {
        Self {
            host,
            ready_wait: HOST_READY_WAIT,
        }
    }

    #[must_use]
    pub const fn ready_wait(mut self, wait: Duration) -> Self {
        self.ready_wait = wait;
        self
    }
}

#[async_trait]
impl<H: HostRegistry> ComponentReloader for ReadinessGate<H> {
    async fn reload_component(&self, instance_id: &str) -> Result<bool> {
        let mut state = self.host.registration_state(instance_id).await?;
        if state == RegistrationState::SetupInProgress {
            debug!("Instance {} still setting up, waiting {:?}", instance_id, self.ready_wait);
            tokio::time::sleep(self.ready_wait).await;
            state = self.host.registration_state(instance_id).await?;
        }

        if state != RegistrationState::Loaded {
            warn!("Instance {} not ready for reload ({:?})", instance_id, state);
            return Ok(false);
        }

        self.host.reload(instance_id).await
    }
}

/// Reloads by running a command, e.g. `systemctl restart home-assistant`.
///
/// The instance id is passed in `COMPONENT_INSTANCE_ID`. Exit status 0 means
/// the reload succeeded.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    /// Build from an argv list.
    ///
    /// # Errors
    ///
    /// Returns an error if `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("reload command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ComponentReloader for CommandReloader {
    async fn reload_component(&self, instance_id: &str) -> Result<bool> {
        debug!("Running reload command {} {:?}", self.program, self.args);
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env(INSTANCE_ID_ENV, instance_id)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to run reload command '{}'", self.program))?;

        if !status.success() {
            warn!("Reload command exited with {}", status);
        }
        Ok(status.success())
    }
}

/// A user-facing notification.
///
/// Notices with the same `dedupe_key` replace each other in sinks that
/// support it, so repeated failures of one release show up once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub dedupe_key: String,
}

impl Notice {
    #[must_use]
    pub fn updated(component: &str, version: &str) -> Self {
        Self {
            title: format!("{component} updated"),
            message: format!("{component} was updated to version {version} and reloaded."),
            dedupe_key: format!("{component}_update_{version}"),
        }
    }

    #[must_use]
    pub fn restart_required(component: &str, version: &str) -> Self {
        Self {
            title: format!("{component} update installed"),
            message: format!(
                "{component} version {version} is installed. Restart the host to load it."
            ),
            dedupe_key: format!("{component}_restart_required"),
        }
    }

    #[must_use]
    pub fn failed(component: &str, version: &str, reason: &str) -> Self {
        Self {
            title: format!("{component} update failed"),
            message: format!(
                "Updating {component} to version {version} failed: {reason}. The installed version was kept."
            ),
            dedupe_key: format!("{component}_update_failed"),
        }
    }

    #[must_use]
    pub fn rolled_back(component: &str, version: &str, reason: &str) -> Self {
        Self {
            message: format!(
                "{component} version {version} was installed but rolled back: {reason}."
            ),
            ..Self::failed(component, version, reason)
        }
    }

    #[must_use]
    pub fn irrecoverable(component: &str, version: &str, reason: &str) -> Self {
        Self {
            title: format!("{component} needs attention"),
            message: format!(
                "Updating {component} to version {version} failed and could not be undone: {reason}. Restore it by hand from the .old or .backup directory."
            ),
            ..Self::failed(component, version, reason)
        }
    }
}

/// Delivers notices. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        info!(key = %notice.dedupe_key, "{}: {}", notice.title, notice.message);
    }
}

/// POSTs notices as JSON to a webhook, without waiting for the response.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: crate::updater::release::http_client(),
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notice: &Notice) {
        LogNotifier.notify(notice);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, webhook notification dropped");
            return;
        };

        let request = self.http.post(&self.url).json(notice).timeout(crate::constants::REGISTRY_TIMEOUT);
        let url = self.url.clone();
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => debug!("Notification delivered to {}", url),
                Ok(resp) => warn!("Webhook {} answered HTTP {}", url, resp.status()),
                Err(e) => warn!("Webhook {} failed: {}", url, e),
            }
        });
    }
}
