//! Scheduler state machine.
//!
//! [`SchedulerState`] decides when the next check is due and folds cycle
//! outcomes back into the retry bookkeeping. It is pure: time comes in as an
//! argument, so the policy is testable without sleeping.
//!
//! ```text
//!            failure with a version
//!   Idle ─────────────────────────────▶ Retrying ──┐ failure: retry_count += 1
//!    ▲ ▲                                   │  ▲    │
//!    │ └── success / up to date ───────────┘  └────┘
//!    │
//!    └── retry_count reached max_retries: abandoned, back to Idle
//! ```
//!
//! `Checking` is held only while a cycle runs.

use crate::updater::config::SchedulePolicy;
use crate::updater::cycle::CycleOutcome;
use crate::updater::version::SemanticVersion;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Checking,
    Retrying,
}

/// Which kind of check a cycle ran as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Regular,
    Retry,
}

/// The most recent install attempt, kept for status logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAttempt {
    pub target_version: SemanticVersion,
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub phase: SchedulerPhase,
    pub last_check: Option<Instant>,
    pub last_failed_version: Option<SemanticVersion>,
    pub retry_count: u32,
    pub last_attempt: Option<UpdateAttempt>,
    /// Phase to return to when the running check is recorded.
    resume: SchedulerPhase,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            last_check: None,
            last_failed_version: None,
            retry_count: 0,
            last_attempt: None,
            resume: SchedulerPhase::Idle,
        }
    }
}

impl SchedulerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Which check, if any, should run at `now`.
    ///
    /// May abandon a failed version whose retries are used up.
    pub fn due_check(&mut self, now: Instant, policy: &SchedulePolicy) -> Option<CheckKind> {
        let since_last = self.last_check.map(|t| now.saturating_duration_since(t));

        if self.phase == SchedulerPhase::Retrying {
            if !policy.retry_on_failure {
                self.clear();
            } else if since_last.is_none_or(|d| d >= policy.retry_delay) {
                if self.retry_count < policy.max_retries {
                    return Some(CheckKind::Retry);
                }
                warn!(
                    "Giving up on version {} after {} attempts",
                    self.last_failed_version
                        .as_ref()
                        .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
                    self.retry_count
                );
                self.clear();
            }
        }

        match since_last {
            None => Some(CheckKind::Regular),
            Some(d) if d > policy.check_interval => Some(CheckKind::Regular),
            Some(_) => None,
        }
    }

    /// Mark a check as running.
    pub fn begin(&mut self) {
        if self.phase != SchedulerPhase::Checking {
            self.resume = self.phase;
        }
        self.phase = SchedulerPhase::Checking;
    }

    /// Fold a finished cycle into the state.
    pub fn record(&mut self, kind: CheckKind, outcome: &CycleOutcome, now: Instant) {
        if self.phase == SchedulerPhase::Checking {
            self.phase = self.resume;
        }
        self.last_check = Some(now);

        if outcome.is_failure() {
            match (kind, outcome.attempted_version()) {
                (CheckKind::Retry, _) => {
                    self.retry_count += 1;
                    self.phase = SchedulerPhase::Retrying;
                }
                (CheckKind::Regular, Some(version)) => {
                    self.phase = SchedulerPhase::Retrying;
                    self.last_failed_version = Some(version.clone());
                    self.retry_count = 1;
                }
                (CheckKind::Regular, None) => {}
            }
        } else {
            self.clear();
        }

        if let Some(version) = outcome.attempted_version() {
            self.last_attempt = Some(UpdateAttempt {
                target_version: version.clone(),
                started_at: Utc::now(),
                outcome: outcome.clone(),
                retry_count: self.retry_count,
            });
        }
    }

    fn clear(&mut self) {
        self.phase = SchedulerPhase::Idle;
        self.resume = SchedulerPhase::Idle;
        self.last_failed_version = None;
        self.retry_count = 0;
    }
}
