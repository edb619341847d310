//! Background update loop.

use crate::updater::config::SchedulePolicy;
use crate::updater::cycle::{CycleOutcome, UpdateCycle};
use crate::updater::state::{CheckKind, SchedulerState};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs update cycles on the configured schedule until cancelled.
///
/// Cancellation is observed only while sleeping; a cycle that has started
/// always runs to completion.
pub struct UpdateScheduler {
    cycle: Arc<dyn UpdateCycle>,
    policy: SchedulePolicy,
    state: SchedulerState,
}

impl UpdateScheduler {
    pub fn new(cycle: Arc<dyn UpdateCycle>, policy: SchedulePolicy) -> Self {
        Self {
            cycle,
            policy,
            state: SchedulerState::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Run until `cancel` fires. Returns the final state.
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerState {
        info!(
            "Update scheduler started (first check in {:?}, interval {:?})",
            self.policy.startup_delay, self.policy.check_interval
        );

        if !sleep_or_cancel(self.policy.startup_delay, &cancel).await {
            info!("Update scheduler stopped before first check");
            return self.state;
        }

        loop {
            self.tick().await;

            if !sleep_or_cancel(self.policy.poll_tick, &cancel).await {
                break;
            }
        }

        info!("Update scheduler stopped");
        self.state
    }

    /// Run the due check, if any.
    pub async fn tick(&mut self) -> Option<CycleOutcome> {
        let kind = self.state.due_check(Instant::now(), &self.policy)?;
        match kind {
            CheckKind::Regular => debug!("Running scheduled update check"),
            CheckKind::Retry => info!(
                "Retrying update (attempt {} of {})",
                self.state.retry_count + 1,
                self.policy.max_retries
            ),
        }

        self.state.begin();
        let cycle = Arc::clone(&self.cycle);
        let outcome = match tokio::spawn(async move { cycle.run_cycle().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Update cycle crashed: {}", e);
                CycleOutcome::Failed {
                    version: None,
                    reason: format!("update cycle crashed: {e}"),
                }
            }
        };

        info!("Update cycle finished: {}", outcome);
        self.state.record(kind, &outcome, Instant::now());
        Some(outcome)
    }
}

/// Sleep for `duration`; `false` if cancelled first.
async fn sleep_or_cancel(duration: std::time::Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
