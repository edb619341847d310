use crate::common::{REPOSITORY, mount_latest, release_body};
use component_updater::core::CheckError;
use component_updater::updater::config::SourceConfig;
use component_updater::updater::{ReleaseClient, SemanticVersion};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReleaseClient {
    ReleaseClient::new(&SourceConfig {
        repository: REPOSITORY.to_string(),
        registry_base: format!("{}/repos", server.uri()),
        source_archive_base: server.uri(),
    })
}

async fn respond_with(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPOSITORY}/releases/latest")))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_release_without_assets_uses_source_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{REPOSITORY}/releases/latest")))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body("v2.3.0", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server).fetch_latest().await.unwrap();

    assert_eq!(info.version, SemanticVersion::new(2, 3, 0));
    assert_eq!(info.tag, "v2.3.0");
    // The tag is used as published, leading "v" included
    assert_eq!(
        info.artifact_url,
        format!("{}/{REPOSITORY}/archive/refs/tags/v2.3.0.zip", server.uri())
    );
    assert_eq!(info.checksum_url, None);
}

#[tokio::test]
async fn test_zip_asset_and_sidecar_checksum_selected() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_latest(
        &server,
        release_body(
            "1.4",
            &[
                ("NOTES.md", format!("{base}/notes")),
                ("SHA256SUMS", format!("{base}/sums")),
                ("ble_bridge.zip", format!("{base}/zip")),
                ("ble_bridge.zip.sha256", format!("{base}/zip.sha256")),
                ("other.zip", format!("{base}/other")),
            ],
        ),
    )
    .await;

    let info = client(&server).fetch_latest().await.unwrap();

    assert_eq!(info.version, SemanticVersion::new(1, 4, 0));
    assert_eq!(info.artifact_url, format!("{base}/zip"));
    assert_eq!(info.artifact_name(), "zip");
    assert_eq!(info.checksum_url, Some(format!("{base}/zip.sha256")));
}

#[tokio::test]
async fn test_checksum_list_used_without_sidecar() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_latest(
        &server,
        release_body(
            "v3.0.0",
            &[
                ("ble_bridge.zip", format!("{base}/ble_bridge.zip")),
                ("checksums.txt", format!("{base}/checksums.txt")),
            ],
        ),
    )
    .await;

    let info = client(&server).fetch_latest().await.unwrap();
    assert_eq!(info.checksum_url, Some(format!("{base}/checksums.txt")));
}

#[tokio::test]
async fn test_missing_repository_is_not_found() {
    let server = MockServer::start().await;
    respond_with(&server, ResponseTemplate::new(404)).await;

    let err = client(&server).fetch_latest().await.unwrap_err();
    assert_eq!(err, CheckError::NotFound);
}

#[tokio::test]
async fn test_server_error_reports_status() {
    let server = MockServer::start().await;
    respond_with(&server, ResponseTemplate::new(500)).await;

    let err = client(&server).fetch_latest().await.unwrap_err();
    assert_eq!(err, CheckError::Status(500));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    respond_with(&server, ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .await;

    let err = client(&server).fetch_latest().await.unwrap_err();
    assert!(matches!(err, CheckError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_release_without_tag_is_malformed() {
    let server = MockServer::start().await;
    respond_with(&server, ResponseTemplate::new(200).set_body_json(serde_json::json!({"assets": []})))
        .await;

    let err = client(&server).fetch_latest().await.unwrap_err();
    assert!(matches!(err, CheckError::Malformed(ref m) if m.contains("tag_name")), "got {err:?}");
}

#[tokio::test]
async fn test_non_version_tag_is_malformed() {
    let server = MockServer::start().await;
    mount_latest(&server, release_body("nightly", &[])).await;

    let err = client(&server).fetch_latest().await.unwrap_err();
    assert!(matches!(err, CheckError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_slow_registry_times_out() {
    let server = MockServer::start().await;
    respond_with(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(release_body("v1.0.0", &[]))
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let err = client(&server).timeout(Duration::from_millis(50)).fetch_latest().await.unwrap_err();
    assert!(matches!(err, CheckError::Network(_)), "got {err:?}");
}
