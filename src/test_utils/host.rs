//! Scripted host collaborators.

use crate::updater::host::{ComponentReloader, Notice, Notifier};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Answers reload requests from a script; `Ok(true)` once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedReloader {
    script: Mutex<VecDeque<Result<bool, String>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedReloader {
    pub fn new(script: impl IntoIterator<Item = Result<bool, String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Take `delay` before answering each reload.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn accepting() -> Self {
        Self::new([])
    }

    pub fn rejecting() -> Self {
        Self::new([Ok(false)])
    }

    /// Instance ids passed to each reload call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComponentReloader for ScriptedReloader {
    async fn reload_component(&self, instance_id: &str) -> anyhow::Result<bool> {
        self.calls.lock().unwrap().push(instance_id.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(accepted)) => Ok(accepted),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(true),
        }
    }
}

/// Keeps every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.dedupe_key).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
