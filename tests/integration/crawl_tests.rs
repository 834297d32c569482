//! Integration tests for the crawler
//!
//! These tests serve pages with wiremock (for probes) and render them with
//! an in-memory driver, then check the on-disk artifacts end-to-end.

use crate::support::{manifest_pages, LogCapture, TestSite, SITE_ID};
use async_trait::async_trait;
use clientside_crawler::auth::{AuthError, AuthRegistry, LoginRoutine, SessionState};
use clientside_crawler::browser::decoder::{
    EXCHANGE_TOKEN_REQ_SUCC, EXCHANGE_TOKEN_REQ_WITHOUT_DATA, EXCHANGE_TOKEN_REQ_WITH_DATA,
};
use clientside_crawler::browser::Driver;
use clientside_crawler::{CrawlError, PageOutcome, TerminationReason};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn read_json(path: std::path::PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_seed_only() {
    let site = TestSite::start().await;
    site.page("/", r#"<html><body><a href="/a">A</a></body></html>"#)
        .await;

    let mut config = site.config();
    config.crawler.max_depth = 0;

    let summaries = site.orchestrator(config).run_range(SITE_ID, SITE_ID, None).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].visited, 1);
    assert_eq!(summaries[0].edges, 0);
    assert_eq!(summaries[0].termination, TerminationReason::MaxDepth);

    assert_eq!(site.visited(), vec![site.url("/")]);
    // discovered but beyond max-depth
    assert_eq!(site.urls(), vec![site.url("/"), site.url("/a")]);
    assert!(site.edges().is_empty());
    assert_eq!(site.artifact_dirs().len(), 1);

    let events = read_json(site.artifact_dir("/").join("events.json"));
    assert_eq!(events, json!({"without_data": [], "with_data": [], "succ": []}));
}

#[tokio::test]
async fn test_extension_filter() {
    let site = TestSite::start().await;
    site.page(
        "/",
        r#"<a href="/a.html">a</a><a href="/b.png">b</a><a href="/c.pdf">c</a><a href="/d">d</a>"#,
    )
    .await;
    site.page("/a.html", "<p>a</p>").await;
    site.page("/d", "<p>d</p>").await;

    let summaries = site
        .orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].termination, TerminationReason::Exhausted);

    let mut visited = site.visited();
    visited.sort();
    let mut expected = vec![site.url("/"), site.url("/a.html"), site.url("/d")];
    expected.sort();
    assert_eq!(visited, expected);
    assert_eq!(site.urls().len(), 3);

    // rejected before any request was made
    let requested: Vec<String> = site
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.iter().any(|p| p == "/b.png" || p == "/c.pdf"));
}

#[tokio::test]
async fn test_cross_origin_filter() {
    let site = TestSite::start().await;
    site.page(
        "/",
        r#"<a href="/x">x</a><a href="https://other.test/y">y</a>"#,
    )
    .await;
    site.page("/x", "<p>x</p>").await;

    site.orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();

    assert_eq!(site.visited(), vec![site.url("/"), site.url("/x")]);
    assert_eq!(site.urls(), vec![site.url("/"), site.url("/x")]);
    let edges = site.edges();
    assert_eq!(edges, vec![(site.url("/"), site.url("/x"), 1)]);
    assert!(edges.iter().all(|(_, dst, _)| !dst.contains("other.test")));
}

#[tokio::test]
async fn test_per_depth_cap_is_reproducible() {
    let site = TestSite::start().await;
    let links: String = (0..100)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    site.page("/", &links).await;

    let mut config = site.config();
    config.crawler.max_depth = 1;
    config.crawler.max_per_depth = 25;

    let summaries = site
        .orchestrator(config.clone())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].visited, 26);

    let manifest = site.manifest("anonymous");
    let depth_one = manifest["pages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["depth"] == 1)
        .count();
    assert_eq!(depth_one, 25);

    // all 100 links were discovered even though only 25 were visited
    let urls = site.urls();
    assert_eq!(urls.len(), 101);
    let unvisited: Vec<&String> = urls
        .iter()
        .filter(|u| !site.visited().contains(u))
        .collect();
    assert_eq!(unvisited.len(), 75);
    let first_run = site.visited();

    // second run into a fresh output root
    let second_output = tempfile::TempDir::new().unwrap();
    config.output.root = second_output.path().to_string_lossy().into_owned();
    site.orchestrator(config)
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();
    let second_manifest: Value = read_json(
        second_output
            .path()
            .join(SITE_ID.to_string())
            .join("crawl_anonymous.json"),
    );

    assert_eq!(first_run, manifest_pages(&second_manifest));
}

#[tokio::test]
async fn test_not_found_is_visited_without_artifact() {
    let site = TestSite::start().await;
    site.page("/", r#"<a href="/gone">gone</a>"#).await;
    site.status("/gone", 404).await;

    let summaries = site
        .orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();

    assert!(site.visited().contains(&site.url("/gone")));
    assert!(!site.artifact_dir("/gone").exists());
    assert!(site.artifact_dir("/").exists());
    assert_eq!(site.edges(), vec![(site.url("/"), site.url("/gone"), 1)]);
    assert_eq!(summaries[0].count(PageOutcome::NotFound), 1);
    assert_eq!(summaries[0].count(PageOutcome::Archived), 1);
}

#[tokio::test]
async fn test_session_rebuild_after_driver_failure() {
    let site = TestSite::start().await;
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    site.page("/", &links).await;
    for i in 1..=5 {
        site.page(&format!("/p{}", i), "<p>page</p>").await;
    }
    // visit order is seed, p1, p2, ...: the third load is /p2
    site.web.fail_on("/p2");

    let summaries = site
        .orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();
    let summary = &summaries[0];

    assert_eq!(summary.visited, 6);
    assert_eq!(summary.count(PageOutcome::LoadFailed), 1);
    assert_eq!(summary.count(PageOutcome::Archived), 5);
    assert!(summary.session_rebuilds >= 1);
    assert!(site.web.launches.load(Ordering::SeqCst) >= 2);

    assert!(site.artifact_dir("/").exists());
    assert!(site.artifact_dir("/p1").exists());
    assert!(!site.artifact_dir("/p2").exists());
    for path in ["/p3", "/p4", "/p5"] {
        assert!(site.artifact_dir(path).exists(), "missing artifact for {}", path);
    }
}

#[tokio::test]
async fn test_instrumentation_events_are_archived() {
    let site = TestSite::start().await;
    site.page(
        "/",
        r#"<html><body><form name="login"><input type="hidden" name="csrf"></form>
        <script>var inline = 1;</script><script src="/app.js"></script></body></html>"#,
    )
    .await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/app.js"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_raw("function app() {}", "application/javascript"),
        )
        .mount(&site.server)
        .await;

    site.web.marker(
        "/",
        EXCHANGE_TOKEN_REQ_WITHOUT_DATA,
        r#"{"requestId":"1","url":"/api/me","method":"GET"}"#,
    );
    site.web.marker(
        "/",
        EXCHANGE_TOKEN_REQ_WITH_DATA,
        r#"{&quot;requestId&quot;:&quot;2&quot;,&quot;url&quot;:&quot;/api/save&quot;,&quot;method&quot;:&quot;POST&quot;,&quot;requestBody&quot;:&quot;a=1&quot;}"#,
    );
    site.web.marker("/", EXCHANGE_TOKEN_REQ_SUCC, r#"{"requestId":"2","status":200}"#);
    site.web.marker("/", EXCHANGE_TOKEN_REQ_SUCC, "not json");
    site.web.console_line("/", r#"{"source":"event-logger","type":"load"}"#);
    site.web.console_line("/", "page script says hello");

    site.orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();

    let dir = site.artifact_dir("/");
    let events = read_json(dir.join("events.json"));
    assert_eq!(events["without_data"][0]["url"], "/api/me");
    assert_eq!(events["with_data"][0]["requestBody"], "a=1");
    assert_eq!(events["succ"][0]["status"], 200);
    assert_eq!(events["succ"][1], "not json");

    let requests = read_json(dir.join("requests.json"));
    let requests = requests.as_array().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["accepted"], false);
    assert_eq!(requests[1]["accepted"], true);
    assert_eq!(requests[1]["status"], 200);

    let mappings = read_json(dir.join("scripts/mappings.json"));
    assert_eq!(mappings["0"], "internal_script");
    assert_eq!(mappings["1"], site.url("/app.js"));
    assert_eq!(
        std::fs::read_to_string(dir.join("scripts/1.js")).unwrap(),
        "function app() {}"
    );

    let props = read_json(dir.join("document_props.json"));
    assert_eq!(props, json!(["document.login", "document.login.csrf"]));

    let console = std::fs::read_to_string(dir.join("console.log")).unwrap();
    assert_eq!(console.lines().count(), 2);
    assert!(console.contains("event-logger"));

    let fired = std::fs::read_to_string(dir.join("events.out")).unwrap();
    assert_eq!(fired.lines().count(), 1);
    assert!(fired.contains(r#""type":"load""#));
}

#[tokio::test]
async fn test_persist_failure_is_logged_and_crawl_continues() {
    let site = TestSite::start().await;
    site.page("/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    site.page("/a", "<p>a</p>").await;
    site.page("/b", "<p>b</p>").await;

    // a plain file where /a's staging directory must go
    let blocked = site.artifact_dir("/a");
    std::fs::create_dir_all(site.site_root()).unwrap();
    let mut staging = blocked.clone().into_os_string();
    staging.push(".tmp");
    std::fs::write(&staging, "in the way").unwrap();

    let logs = LogCapture::default();
    let summaries = {
        let _guard = logs.install();
        site.orchestrator(site.config())
            .run_range(SITE_ID, SITE_ID, None)
            .await
            .unwrap()
    };

    let summary = &summaries[0];
    assert_eq!(summary.termination, TerminationReason::Exhausted);
    assert_eq!(summary.visited, 3);
    assert_eq!(summary.count(PageOutcome::PersistFailed), 1);
    assert_eq!(summary.count(PageOutcome::Archived), 2);

    assert!(!blocked.exists());
    assert!(site.artifact_dir("/").exists());
    assert!(site.artifact_dir("/b").exists());
    assert_eq!(site.urls().len(), 3);

    let output = logs.contents();
    let line = output
        .lines()
        .find(|l| l.contains("kind=persist_failure"))
        .expect("no persist failure logged");
    assert!(line.contains(&site.url("/a")));
    assert!(line.contains("site_id=1"));
}

#[tokio::test]
async fn test_recrawl_replaces_artifacts() {
    let site = TestSite::start().await;
    site.page("/", "<p>first</p>").await;
    site.orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();

    let dir = site.artifact_dir("/");
    assert_eq!(
        std::fs::read_to_string(dir.join("html.html")).unwrap(),
        "<p>first</p>"
    );

    // the browser now renders different content for the same URL
    site.web.render("/", "<p>second</p>");
    site.orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID, None)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.join("html.html")).unwrap(),
        "<p>second</p>"
    );
    assert_eq!(site.artifact_dirs(), vec![dir]);
    let leftovers: Vec<_> = std::fs::read_dir(site.site_root())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".old") || name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
}

struct CountingLogin {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl LoginRoutine for CountingLogin {
    async fn run(&self, driver: &mut dyn Driver) -> Result<(), AuthError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        driver.click("#login").await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_login_state() {
    let site = TestSite::start().await;
    site.page("/", "<p>home</p>").await;

    let mut config = site.config();
    config.browser.use_state_scripts = true;

    let runs = Arc::new(AtomicUsize::new(0));
    let mut auth = AuthRegistry::new();
    auth.register(
        SITE_ID,
        SessionState::new(
            "member",
            Arc::new(CountingLogin {
                runs: Arc::clone(&runs),
            }),
        )
        .unwrap(),
    );

    let summaries = site
        .orchestrator(config)
        .with_auth_registry(auth)
        .run_range(SITE_ID, SITE_ID, Some("member"))
        .await
        .unwrap();

    assert_eq!(summaries[0].label, "member");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(site.manifest("member")["label"], "member");
}

#[tokio::test]
async fn test_unknown_site_is_fatal() {
    let site = TestSite::start().await;

    let err = site
        .orchestrator(site.config())
        .run_range(SITE_ID, SITE_ID + 1, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::InvalidSite { site_id } if site_id == SITE_ID + 1));
    assert!(err.is_fatal());
    // nothing was crawled
    assert!(!site.site_root().exists());
}
