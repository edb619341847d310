use crate::common::{COMPONENT, REPOSITORY, config_for, mount_latest, publish_release, release_body};
use component_updater::test_utils::{
    LiveTree, RecordingNotifier, ReleaseArchive, ScriptedReloader, snapshot,
};
use component_updater::updater::{
    ComponentReloader, ComponentUpdater, CycleOutcome, ReleaseClient, SemanticVersion, UpdateCycle,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn updater(
    tree: &LiveTree,
    server: &MockServer,
    reloader: Option<Arc<dyn ComponentReloader>>,
    notifier: &Arc<RecordingNotifier>,
) -> ComponentUpdater {
    let config = config_for(tree, server);
    let mut installer = tree.installer().instance_id("test-instance");
    if let Some(reloader) = reloader {
        installer = installer.reloader(reloader);
    }
    ComponentUpdater::new(COMPONENT, ReleaseClient::new(&config.source), installer, notifier.clone())
}

fn v2() -> SemanticVersion {
    SemanticVersion::new(2, 0, 0)
}

#[tokio::test]
async fn test_update_installs_and_reloads() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    tree.write("local_settings.yaml", "token: abc\n").unwrap();
    let zip = ReleaseArchive::plugin(COMPONENT, "2.0.0")
        .file("custom_components/ble_bridge/climate.py", "CLIMATE = True\n")
        .into_bytes();
    publish_release(&server, "v2.0.0", zip, 1).await;

    let reloader = Arc::new(ScriptedReloader::accepting());
    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, Some(reloader.clone()), &notifier);

    let outcome = updater.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Updated(v2()));
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
    assert_eq!(tree.read("sensor.py").unwrap(), "SENSORS = ['2.0.0']\n");
    assert_eq!(tree.read("climate.py").unwrap(), "CLIMATE = True\n");
    // Files the release does not ship survive the update
    assert_eq!(tree.read("local_settings.yaml").unwrap(), "token: abc\n");

    let paths = updater.installer().paths();
    assert!(paths.backup.is_dir(), "backup of the previous tree is kept");
    assert!(!paths.old.exists());
    assert!(!paths.staging.exists());

    assert_eq!(reloader.calls(), vec!["test-instance".to_string()]);
    assert_eq!(notifier.keys(), vec!["ble_bridge_update_2.0.0".to_string()]);
}

#[tokio::test]
async fn test_manifest_stamped_with_release_version() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    // Release tagged 2.0.0 whose manifest still says 1.9.0
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "1.9.0").into_bytes(), 1)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, Some(Arc::new(ScriptedReloader::accepting())), &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::Updated(v2()));
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");

    let manifest: serde_json::Value =
        serde_json::from_str(&tree.read("manifest.json").unwrap()).unwrap();
    assert_eq!(manifest["domain"], COMPONENT, "other manifest fields are kept");
}

#[tokio::test]
async fn test_rejected_reload_restores_previous_tree() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, Some(Arc::new(ScriptedReloader::rejecting())), &notifier);

    let outcome = updater.run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::RolledBack { version, .. } if *version == v2()),
        "got {outcome:?}"
    );
    assert_eq!(snapshot(tree.live_root()), before);
    assert!(!updater.installer().paths().old.exists());
    assert!(!updater.installer().paths().staging.exists());
    assert_eq!(notifier.keys(), vec!["ble_bridge_update_failed".to_string()]);
}

#[tokio::test]
async fn test_reload_error_restores_previous_tree() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let reloader = Arc::new(ScriptedReloader::new([Err("host unreachable".to_string())]));
    let updater = updater(&tree, &server, Some(reloader), &notifier);

    let outcome = updater.run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::RolledBack { reason, .. } if reason.contains("host unreachable")),
        "got {outcome:?}"
    );
    assert_eq!(snapshot(tree.live_root()), before);
}

#[tokio::test]
async fn test_without_reloader_restart_is_required() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    publish_release(&server, "v2.0.0", ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes(), 1)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, None, &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::RestartRequired(v2()));
    assert_eq!(tree.manifest_version().unwrap(), "2.0.0");
    assert!(!updater.installer().paths().old.exists());
    assert_eq!(notifier.keys(), vec!["ble_bridge_restart_required".to_string()]);
}

#[tokio::test]
async fn test_excluded_paths_are_not_installed() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    let zip = ReleaseArchive::plugin(COMPONENT, "2.0.0")
        .file("custom_components/ble_bridge/__pycache__/sensor.cpython-312.pyc", "bytecode")
        .file("custom_components/ble_bridge/helpers.pyc", "bytecode")
        .into_bytes();
    publish_release(&server, "v2.0.0", zip, 1).await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, None, &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::RestartRequired(v2()));
    assert!(!tree.live_root().join("__pycache__").exists());
    assert!(!tree.live_root().join("helpers.pyc").exists());
}

#[tokio::test]
async fn test_source_archive_fallback_installs() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    mount_latest(&server, release_body("v2.0.0", &[])).await;

    // GitHub-style source archive: everything under one `<repo>-<tag>` folder
    let zip = ReleaseArchive::new()
        .file("ble_bridge-2.0.0/README.md", "# BLE bridge\n")
        .file("ble_bridge-2.0.0/custom_components/ble_bridge/manifest.json", r#"{"version": "2.0.0"}"#)
        .file("ble_bridge-2.0.0/custom_components/ble_bridge/__init__.py", "# 2.0.0\n")
        .into_bytes();
    Mock::given(method("GET"))
        .and(path(format!("/{REPOSITORY}/archive/refs/tags/v2.0.0.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, None, &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::RestartRequired(v2()));
    assert_eq!(tree.read("__init__.py").unwrap(), "# 2.0.0\n");
    assert!(!tree.live_root().join("README.md").exists());
}

#[tokio::test]
async fn test_verified_checksum_installs() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    let zip = ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes();
    let digest = hex::encode(Sha256::digest(&zip));
    mount_release_with_checksum(&server, zip, format!("{digest}  ble_bridge.zip\n")).await;

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, None, &notifier);

    assert_eq!(updater.run_cycle().await, CycleOutcome::RestartRequired(v2()));
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_tree_untouched() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    let zip = ReleaseArchive::plugin(COMPONENT, "2.0.0").into_bytes();
    mount_release_with_checksum(&server, zip, format!("{}\n", "0".repeat(64))).await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, Some(Arc::new(ScriptedReloader::accepting())), &notifier);

    let outcome = updater.run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::Failed { version: Some(v), reason } if *v == v2() && reason.contains("checksum")),
        "got {outcome:?}"
    );
    assert_eq!(snapshot(tree.live_root()), before);
    assert!(!updater.installer().paths().backup.exists(), "nothing was staged");
    assert_eq!(notifier.keys(), vec!["ble_bridge_update_failed".to_string()]);
}

#[tokio::test]
async fn test_release_missing_manifest_is_rejected() {
    let server = MockServer::start().await;
    let tree = LiveTree::new(COMPONENT, "1.0.0").unwrap();
    let zip = ReleaseArchive::plugin(COMPONENT, "2.0.0").without("manifest.json").into_bytes();
    publish_release(&server, "v2.0.0", zip, 1).await;
    let before = snapshot(tree.live_root());

    let notifier = Arc::new(RecordingNotifier::new());
    let updater = updater(&tree, &server, Some(Arc::new(ScriptedReloader::accepting())), &notifier);

    let outcome = updater.run_cycle().await;

    assert!(
        matches!(&outcome, CycleOutcome::Failed { reason, .. } if reason.contains("manifest.json")),
        "got {outcome:?}"
    );
    assert_eq!(snapshot(tree.live_root()), before);
    assert!(!updater.installer().paths().old.exists());
    assert!(!updater.installer().paths().staging.exists());
}

async fn mount_release_with_checksum(server: &MockServer, zip: Vec<u8>, sidecar: String) {
    let base = server.uri();
    mount_latest(
        server,
        release_body(
            "v2.0.0",
            &[
                ("ble_bridge.zip", format!("{base}/assets/ble_bridge.zip")),
                ("ble_bridge.zip.sha256", format!("{base}/assets/ble_bridge.zip.sha256")),
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/assets/ble_bridge.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/ble_bridge.zip.sha256"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sidecar))
        .mount(server)
        .await;
}
