use crate::common::{COMPONENT, REPOSITORY, config_for, publish_release, release_body};
use component_updater::test_utils::{LiveTree, RecordingNotifier, ReleaseArchive, snapshot};
use component_updater::updater::{
    CheckKind, ComponentUpdater, CycleOutcome, ReleaseClient, SchedulerPhase, SchedulerState,
    SemanticVersion, UpdateCycle,
};
use std::sync::Arc;
use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn updater(tree: &LiveTree, server: &MockServer, notifier: &Arc<RecordingNotifier>) -> ComponentUpdater {
    let config = config_for(tree, server);
    ComponentUpdater::new(
        COMPONENT,
        ReleaseClient::new(&config.source),
        tree.installer(),
        notifier.clone(),
    )
}

#[tokio::test]
async fn test_same_version_is_not_downloaded() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "2.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 0)
        .await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::UpToDate);
    assert_eq!(snapshot(tree.live_root()), before);
    assert!(!updater.installer().paths().backup.exists());
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn test_older_release_is_ignored() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "2.0.0").unwrap();
    publish_release(&server, "v1.9.3", ReleaseArchive::plugin(COMPONENT, "1.9.3").into_bytes(), 0)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    assert_eq!(updater(&tree, &server, &notifier).run_cycle().await, CycleOutcome::UpToDate);
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
}

#[tokio::test]
async fn test_force_reinstalls_same_version() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "2.0.0").unwrap();
    tree.write("sensor.py", "SENSORS = ['edited by hand']\n").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, &notifier).force(true);

    assert_eq!(
        updater.run_cycle().await,
        CycleOutcome::RestartRequired(SemanticVersion::new(2, 0, 0))
    );
    assert_eq!(tree.read("sensor.py").unwrap(), "SENSORS = ['2.0.0']\n");
}

#[tokio::test]
async fn test_missing_release_records_no_failed_version() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPOSITORY}/releases/latest")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let outcome = updater(&tree, &server, &notifier).run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::Failed { version: None, reason } if reason.contains("not found")),
        "got {outcome:?}"
    );
    assert!(notifier.notices().is_empty());

    let mut state = SchedulerState::new();
    state.begin();
    state.record(CheckKind::Regular, &outcome, Instant::now());
    assert_eq!(state.phase, SchedulerPhase::Idle);
    assert_eq!(state.last_failed_version, None);
    assert_eq!(state.retry_count, 0);
    assert!(state.last_check.is_some());
}

#[tokio::test]
async fn test_unreadable_live_manifest_skips_registry() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    tree.write("manifest.json", "{ not json").unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body("v2.0.0", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let outcome = updater(&tree, &server, &notifier).run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::Failed { version: None, reason } if reason.contains("manifest.json")),
        "got {outcome:?}"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_forced_update_replaces_unreadable_manifest() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    tree.write("manifest.json", "{ not json").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, &notifier).force(true);

    assert_eq!(
        updater.run_cycle().await,
        CycleOutcome::RestartRequired(SemanticVersion::new(2, 0, 0))
    );
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
}

#[tokio::test]
async fn test_download_failure_keeps_tree() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    let asset_url = format!("{}/download/v2.0.0.zip", server.uri());
    crate::common::mount_latest(&server, release_body("v2.0.0", &[("ble_bridge.zip", asset_url)]))
        .await;
    Mock::given(method("GET"))
        .and(path("/download/v2.0.0.zip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, &notifier);
    let outcome = updater.run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::Failed { version: Some(v), reason } if *v == SemanticVersion::new(2, 0, 0) && reason.contains("503")),
        "got {outcome:?}"
    );
    assert_eq!(snapshot(tree.live_root()), before);
    assert!(!updater.installer().paths().backup.exists());
    // Transient download errors are only logged
    assert!(notifier.notices().is_empty());
}
