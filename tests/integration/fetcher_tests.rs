//! Probe classification against a wiremock server

use clientside_crawler::config::FetcherConfig;
use clientside_crawler::crawler::{Fetcher, ProbeResult};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_fetcher() -> Fetcher {
    Fetcher::new(&FetcherConfig {
        timeout: 2,
        max_redirects: 3,
        fetch_external_scripts: true,
    })
    .unwrap()
}

#[tokio::test]
async fn test_probe_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("accept-encoding", "identity"))
        .and(header("connection", "close"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>hi</html>", "text/html"))
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/", server.uri())).await;

    assert_eq!(
        result,
        ProbeResult::Html {
            final_url: format!("{}/", server.uri()),
            status: 200,
            body: "<html>hi</html>".to_string(),
        }
    );
}

#[tokio::test]
async fn test_probe_not_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/logo", server.uri())).await;

    assert!(matches!(result, ProbeResult::NotHtml { content_type } if content_type.starts_with("image/png")));
}

#[tokio::test]
async fn test_probe_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/removed"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher();

    // unmatched paths are 404 on a MockServer
    assert_eq!(
        fetcher.probe(&format!("{}/gone", server.uri())).await,
        ProbeResult::NotFound { status: 404 }
    );
    assert_eq!(
        fetcher.probe(&format!("{}/removed", server.uri())).await,
        ProbeResult::NotFound { status: 410 }
    );
}

#[tokio::test]
async fn test_probe_server_error_still_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_raw("<html>oops</html>", "text/html"))
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/broken", server.uri())).await;

    assert!(matches!(result, ProbeResult::Html { status: 500, .. }));
}

#[tokio::test]
async fn test_probe_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>new</p>", "text/html"))
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/old", server.uri())).await;

    match result {
        ProbeResult::Html { final_url, .. } => assert!(final_url.ends_with("/new")),
        other => panic!("expected Html, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_redirect_loop_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/loop", server.uri())).await;

    assert!(matches!(result, ProbeResult::Unreachable { .. }));
}

#[tokio::test]
async fn test_probe_timeout_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<p>slow</p>", "text/html")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = create_test_fetcher().probe(&format!("{}/slow", server.uri())).await;

    assert_eq!(
        result,
        ProbeResult::Unreachable {
            reason: "Request timeout".to_string()
        }
    );
}

#[tokio::test]
async fn test_fetch_script_skips_html_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("let a = 1;", "text/javascript"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login.js"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<!DOCTYPE html><html></html>", "text/plain"),
        )
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher();

    assert_eq!(
        fetcher.fetch_script(&format!("{}/app.js", server.uri())).await,
        Some("let a = 1;".to_string())
    );
    assert_eq!(
        fetcher.fetch_script(&format!("{}/login.js", server.uri())).await,
        None
    );
    assert_eq!(
        fetcher.fetch_script(&format!("{}/missing.js", server.uri())).await,
        None
    );
}
