//! End-to-end crawl scenarios against a local `wiremock` server: a base
//! crawl, a redirect chain, robots.txt disallow, foreign-asset-vs-page
//! scope, the basename loop guard, and the rate limiter's request budget.
//! Each test builds a minimal `CrawlConfig`, runs the engine to completion,
//! and inspects the visited and skipped snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sitecrawl::engine::tables::{SkipReason, VisitState};
use sitecrawl::engine::{CrawlConfig, CrawlEngine};
use sitecrawl::http_client::HttpOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_config(seed_url: String) -> CrawlConfig {
    CrawlConfig {
        seed_url,
        workers: 4,
        max_reqs_per_sec: 1000.0,
        timeout: Duration::from_secs(5),
        max_queue_length: 1000,
        max_visited_urls: 1000,
        max_skipped_urls: 1000,
        max_url_length: 2048,
        max_non200_responses_per_basename: 5,
        allowed_domains_for_external_files: Vec::new(),
        allowed_domains_for_crawling: Vec::new(),
        single_foreign_page: false,
        max_depth: None,
        include_regex: Vec::new(),
        ignore_regex: Vec::new(),
        regex_filtering_only_for_pages: false,
        ignore_robots_txt: true,
        remove_query_params: false,
        add_random_query_params: false,
        transform_rules: Vec::new(),
        crawl_only_html_files: false,
        http: HttpOptions {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..HttpOptions::default()
        },
        http_cache_dir: None,
        http_cache_compression: false,
        ledger_file: None,
    }
}

async fn run_to_completion(config: CrawlConfig) -> Arc<CrawlEngine> {
    let engine = Arc::new(CrawlEngine::new(config).expect("engine builds"));
    let done_calls = Arc::new(AtomicUsize::new(0));
    let done_calls_cb = done_calls.clone();
    let visited_cb: sitecrawl::engine::VisitedCallback = Arc::new(|_, _| Default::default());
    let done_cb: sitecrawl::engine::DoneCallback = Arc::new(move || {
        done_calls_cb.fetch_add(1, Ordering::SeqCst);
    });
    engine.clone().run(visited_cb, done_cb).await.expect("crawl completes");
    assert_eq!(done_calls.load(Ordering::SeqCst), 1, "done callback must fire exactly once");
    engine
}

#[tokio::test]
async fn base_crawl_visits_seed_and_its_two_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/")).respond_with(
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><body><a href="/a">a</a><a href="/b">b</a></body></html>"#)
            .insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).and(path("/a")).respond_with(
        ResponseTemplate::new(200).set_body_string("<html></html>").insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).and(path("/b")).respond_with(
        ResponseTemplate::new(200).set_body_string("<html></html>").insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;

    let engine = run_to_completion(base_config(format!("{}/", server.uri()))).await;
    let visited = engine.visited_snapshot().await;

    assert_eq!(visited.len(), 3);
    assert!(visited.iter().all(|v| v.state == VisitState::Visited));
    let mut paths: Vec<&str> = visited.iter().map(|v| v.url.as_str()).collect();
    paths.sort();
    assert!(paths.iter().any(|p| p.ends_with('/')));
    assert!(paths.iter().any(|p| p.ends_with("/a")));
    assert!(paths.iter().any(|p| p.ends_with("/b")));
}

#[tokio::test]
async fn redirect_chain_records_both_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/")).respond_with(
        ResponseTemplate::new(301).insert_header("location", "/x"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).and(path("/x")).respond_with(
        ResponseTemplate::new(200).set_body_string("<html></html>").insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;

    let mut config = base_config(format!("{}/", server.uri()));
    config.http.timeout = Duration::from_secs(5);
    let engine = run_to_completion(config).await;
    let visited = engine.visited_snapshot().await;

    assert_eq!(visited.len(), 2);
    let root = visited.iter().find(|v| v.url.ends_with('/')).expect("root visited");
    assert_eq!(root.status_code, 301);
    let target = visited.iter().find(|v| v.url.ends_with("/x")).expect("redirect target visited");
    assert_eq!(target.status_code, 200);
}

#[tokio::test]
async fn robots_disallow_skips_private_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/robots.txt")).respond_with(
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).and(path("/")).respond_with(
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><body><a href="/private/p">p</a><a href="/public/q">q</a></body></html>"#)
            .insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).and(path("/public/q")).respond_with(
        ResponseTemplate::new(200).set_body_string("<html></html>").insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;

    let mut config = base_config(format!("{}/", server.uri()));
    config.ignore_robots_txt = false;
    let engine = run_to_completion(config).await;

    let visited = engine.visited_snapshot().await;
    let skipped = engine.skipped_snapshot().await;

    assert!(visited.iter().any(|v| v.url.ends_with("/public/q")));
    assert!(!visited.iter().any(|v| v.url.ends_with("/private/p")));
    let skip = skipped.iter().find(|s| s.url.ends_with("/private/p")).expect("private path skipped");
    assert_eq!(skip.reason, SkipReason::RobotsTxt);
}

#[tokio::test]
async fn foreign_asset_allowed_foreign_page_rejected() {
    let cdn = MockServer::start().await;
    Mock::given(method("GET")).and(path("/img.png")).respond_with(
        ResponseTemplate::new(200).set_body_bytes(vec![0u8; 16]).insert_header("content-type", "image/png"),
    )
    .mount(&cdn)
    .await;

    let origin = MockServer::start().await;
    let cdn_host = url::Url::parse(&cdn.uri()).unwrap().host_str().unwrap().to_string();
    let body = format!(
        r#"<html><body><img src="{}/img.png"><a href="{}/">cdn home</a></body></html>"#,
        cdn.uri(),
        cdn.uri()
    );
    Mock::given(method("GET")).and(path("/")).respond_with(
        ResponseTemplate::new(200).set_body_string(body).insert_header("content-type", "text/html"),
    )
    .mount(&origin)
    .await;

    let mut config = base_config(format!("{}/", origin.uri()));
    config.allowed_domains_for_external_files = vec![cdn_host];
    let engine = run_to_completion(config).await;

    let visited = engine.visited_snapshot().await;
    let skipped = engine.skipped_snapshot().await;

    assert!(visited.iter().any(|v| v.url.ends_with("/img.png")));
    let skip = skipped.iter().find(|s| s.url.ends_with(&cdn.uri()) || s.url == format!("{}/", cdn.uri()));
    assert!(skip.is_some(), "foreign page link should be skipped as NotAllowedHost");
    assert_eq!(skip.unwrap().reason, SkipReason::NotAllowedHost);
}

#[tokio::test]
async fn basename_loop_guard_caps_repeated_404_basename() {
    let server = MockServer::start().await;
    let mut links = String::new();
    for i in 0..20 {
        links.push_str(&format!(r#"<a href="/a{i}/missing.jpg">x</a>"#));
    }
    let body = format!("<html><body>{links}</body></html>");
    Mock::given(method("GET"))
        .and(path("/404page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(body).insert_header("content-type", "text/html"),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(5)
        .mount(&server)
        .await;

    let mut config = base_config(format!("{}/404page", server.uri()));
    config.max_non200_responses_per_basename = 5;
    let engine = run_to_completion(config).await;

    let visited = engine.visited_snapshot().await;
    let missing_jpg_visits = visited.iter().filter(|v| v.url.ends_with("missing.jpg")).count();
    assert!(missing_jpg_visits <= 5, "expected at most 5 missing.jpg visits, got {missing_jpg_visits}");
}

#[tokio::test]
async fn rate_limit_caps_completed_requests_over_wall_clock_budget() {
    let server = MockServer::start().await;
    let mut links = String::new();
    for i in 0..200 {
        links.push_str(&format!(r#"<a href="/p{i}">x</a>"#));
    }
    let root_body = format!("<html><body>{links}</body></html>");
    Mock::given(method("GET")).and(path("/")).respond_with(
        ResponseTemplate::new(200).set_body_string(root_body).insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;
    Mock::given(method("GET")).respond_with(
        ResponseTemplate::new(200).set_body_string("<html></html>").insert_header("content-type", "text/html"),
    )
    .mount(&server)
    .await;

    let mut config = base_config(format!("{}/", server.uri()));
    config.workers = 8;
    config.max_reqs_per_sec = 10.0;
    config.max_visited_urls = 300;
    config.max_queue_length = 300;

    let engine = Arc::new(CrawlEngine::new(config).expect("engine builds"));
    let visited_cb: sitecrawl::engine::VisitedCallback = Arc::new(|_, _| Default::default());
    let done_cb: sitecrawl::engine::DoneCallback = Arc::new(|| {});

    // The crawl won't finish within the budget at this rate; only the
    // completed-request count within the window matters here.
    let _ = tokio::time::timeout(Duration::from_secs(2), engine.clone().run(visited_cb, done_cb)).await;

    let visited = engine.visited_snapshot().await;
    let completed = visited.iter().filter(|v| v.state == VisitState::Visited).count();
    assert!(completed <= 22, "expected at most 22 completed requests in 2s at 10 req/s, got {completed}");
}
