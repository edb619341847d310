use crate::common::{COMPONENT, config_for, publish_release};
use component_updater::test_utils::{
    LiveTree, RecordingNotifier, ReleaseArchive, ScriptedReloader, snapshot,
};
use component_updater::updater::{
    ComponentUpdater, CycleOutcome, ReleaseClient, SchedulePolicy, SchedulerPhase, SemanticVersion,
    UpdateScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

const RETRY_DELAY: Duration = Duration::from_millis(150);

fn policy() -> SchedulePolicy {
    SchedulePolicy {
        check_interval: Duration::from_secs(3600),
        startup_delay: Duration::ZERO,
        retry_delay: RETRY_DELAY,
        max_retries: 3,
        poll_tick: Duration::from_millis(10),
        retry_on_failure: true,
    }
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 3)
        .await;
    let before = snapshot(tree.live_root());

    let reloader = Arc::new(ScriptedReloader::new([Ok(false), Ok(false), Ok(false)]));
    let notifier = Arc::new(RecordingNotifier::new());
    let config = config_for(&tree, &server);
    let updater = ComponentUpdater::new(
        COMPONENT,
        ReleaseClient::new(&config.source),
        tree.installer().reloader(reloader.clone()),
        notifier.clone(),
    );
    let mut scheduler = UpdateScheduler::new(Arc::new(updater), policy());

    let first = scheduler.tick().await;
    assert!(matches!(first, Some(CycleOutcome::RolledBack { .. })), "got {first:?}");
    assert_eq!(scheduler.state().phase, SchedulerPhase::Retrying);
    assert_eq!(scheduler.state().last_failed_version, Some(SemanticVersion::new(2, 0, 0)));
    assert_eq!(scheduler.tick().await, None, "retry waits for the retry delay");

    for attempt in 2..=3 {
        tokio::time::sleep(RETRY_DELAY).await;
        let outcome = scheduler.tick().await;
        assert!(matches!(outcome, Some(CycleOutcome::RolledBack { .. })), "got {outcome:?}");
        assert_eq!(scheduler.state().retry_count, attempt);
    }

    // Retries used up: the version is abandoned until the next regular check
    tokio::time::sleep(RETRY_DELAY).await;
    assert_eq!(scheduler.tick().await, None);
    let state = scheduler.state();
    assert_eq!(state.phase, SchedulerPhase::Idle);
    assert_eq!(state.last_failed_version, None);
    assert_eq!(state.retry_count, 0);

    assert_eq!(reloader.calls().len(), 3);
    assert_eq!(snapshot(tree.live_root()), before);
    assert_eq!(notifier.keys(), vec!["ble_bridge_update_failed".to_string(); 3]);
}

#[tokio::test]
async fn test_successful_retry_clears_failure() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 2)
        .await;

    let reloader = Arc::new(ScriptedReloader::new([Ok(false), Ok(true)]));
    let config = config_for(&tree, &server);
    let updater = ComponentUpdater::new(
        COMPONENT,
        ReleaseClient::new(&config.source),
        tree.installer().reloader(reloader),
        Arc::new(RecordingNotifier::new()),
    );
    let mut scheduler = UpdateScheduler::new(Arc::new(updater), policy());

    assert!(matches!(scheduler.tick().await, Some(CycleOutcome::RolledBack { .. })));
    tokio::time::sleep(RETRY_DELAY).await;
    assert_eq!(
        scheduler.tick().await,
        Some(CycleOutcome::Updated(SemanticVersion::new(2, 0, 0)))
    );
    assert_eq!(scheduler.state().phase, SchedulerPhase::Idle);
    assert_eq!(scheduler.state().last_failed_version, None);
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
}

#[tokio::test]
async fn test_cancel_during_startup_delay_runs_nothing() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 0)
        .await;

    let config = config_for(&tree, &server);
    let updater = ComponentUpdater::from_config(&config, None);
    let scheduler = UpdateScheduler::new(
        Arc::new(updater),
        SchedulePolicy {
            startup_delay: Duration::from_secs(3600),
            ..policy()
        },
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let state = handle.await.unwrap();
    assert_eq!(state.last_check, None);
    assert_eq!(tree.manifest_version().unwrap(), "1.0.0");
}

#[tokio::test]
async fn test_restarted_scheduler_checks_like_first_run() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;
    let config = config_for(&tree, &server);

    // First process: cancelled before it ever checks
    let first = UpdateScheduler::new(
        Arc::new(ComponentUpdater::from_config(&config, None)),
        SchedulePolicy {
            startup_delay: Duration::from_secs(3600),
            ..policy()
        },
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    first.run(cancel).await;

    // Second process: nothing carried over, so the startup check runs
    let mut second =
        UpdateScheduler::new(Arc::new(ComponentUpdater::from_config(&config, None)), policy());
    assert!(second.state().last_check.is_none());
    assert_eq!(
        second.tick().await,
        Some(CycleOutcome::RestartRequired(SemanticVersion::new(2, 0, 0)))
    );
    assert!(second.state().last_check.is_some());
}

#[tokio::test]
async fn test_cancel_while_reloading_finishes_the_install() {
    const RELOAD_DELAY: Duration = Duration::from_millis(400);

    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;

    let reloader = Arc::new(ScriptedReloader::accepting().with_delay(RELOAD_DELAY));
    let config = config_for(&tree, &server);
    let installer = tree.installer().reloader(reloader.clone());
    let paths = installer.paths().clone();
    let updater = ComponentUpdater::new(
        COMPONENT,
        ReleaseClient::new(&config.source),
        installer,
        Arc::new(RecordingNotifier::new()),
    );
    let scheduler = UpdateScheduler::new(Arc::new(updater), policy());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    // wait until the new tree is swapped in and the host is reloading
    tokio::time::timeout(Duration::from_secs(10), async {
        while reloader.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("reload never started");
    assert!(paths.old.exists(), "previous tree is held aside during the reload");
    let cancelled_at = std::time::Instant::now();
    cancel.cancel();

    let state = handle.await.unwrap();
    assert!(cancelled_at.elapsed() >= RELOAD_DELAY / 2, "run returned before the reload finished");
    assert!(state.last_check.is_some());
    let attempt = state.last_attempt.expect("attempt recorded");
    assert_eq!(attempt.outcome, CycleOutcome::Updated(SemanticVersion::new(2, 0, 0)));
    assert_eq!(reloader.calls().len(), 1);
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
    assert!(!paths.staging.exists());
    assert!(!paths.old.exists());
}
