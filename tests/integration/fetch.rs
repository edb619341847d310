use component_updater::core::FetchError;
use component_updater::updater::ArchiveFetcher;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, template: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path("/release.zip"))
        .respond_with(template)
        .mount(server)
        .await;
    format!("{}/release.zip", server.uri())
}

fn entries(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn test_download_writes_body_to_scratch_dir() {
    let server = MockServer::start().await;
    // Larger than one write buffer
    let body: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    let url = serve(&server, ResponseTemplate::new(200).set_body_bytes(body.clone())).await;
    let scratch = TempDir::new().unwrap();

    let archive = ArchiveFetcher::new().download(&url, scratch.path()).await.unwrap();

    assert_eq!(archive, scratch.path().join("update.zip"));
    assert_eq!(std::fs::read(&archive).unwrap(), body);
}

#[tokio::test]
async fn test_http_error_leaves_no_file() {
    let server = MockServer::start().await;
    let url = serve(&server, ResponseTemplate::new(404)).await;
    let scratch = TempDir::new().unwrap();

    let err = ArchiveFetcher::new().download(&url, scratch.path()).await.unwrap_err();

    assert_eq!(err, FetchError::HttpStatus(404));
    assert_eq!(entries(&scratch), 0);
}

#[tokio::test]
async fn test_timeout_leaves_no_partial_file() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        ResponseTemplate::new(200)
            .set_body_bytes(vec![7u8; 1024])
            .set_delay(Duration::from_millis(500)),
    )
    .await;
    let scratch = TempDir::new().unwrap();

    let err = ArchiveFetcher::new()
        .timeout(Duration::from_millis(50))
        .download(&url, scratch.path())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network(ref m) if m.contains("timed out")), "got {err:?}");
    assert_eq!(entries(&scratch), 0);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // bind then release a port so nothing is listening on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let url = format!("http://127.0.0.1:{port}/release.zip");
    let scratch = TempDir::new().unwrap();

    let err = ArchiveFetcher::new().download(&url, scratch.path()).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
}
