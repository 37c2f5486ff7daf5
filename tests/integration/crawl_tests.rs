//! Integration tests for the mirror
//!
//! These tests use wiremock to serve a small catalog and run the real
//! HTTP client and file stores against a temporary data directory.

use catalog_mirror::catalog::{DownloadDepth, Timestamp};
use catalog_mirror::config::{Config, JsonFormatting};
use catalog_mirror::crawler::{run_crawl, CrawlEngine};
use catalog_mirror::reports::{LeafCountVisitor, ReportAggregator};
use catalog_mirror::{CatalogError, CrawlSummary, StopReason};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two pages: `2020-10-20` and `2020-10-21` on page0, `2020-10-22` on page1
const TWO_PAGES: &[&[(&str, &str)]] = &[
    &[("A", "2020-10-20T00:00:00Z"), ("B", "2020-10-21T00:00:00Z")],
    &[("C", "2020-10-22T00:00:00Z")],
];

const CURSOR_FILE: &str = "127.0.0.1/catalog/cursor.download.CatalogLeaf.json";

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn leaf_path(commit: &str, id: &str) -> String {
    let stamp = ts(commit).to_utc().format("%Y.%m.%d.%H.%M.%S").to_string();
    format!("/catalog/data/{}/{}.1.0.0.json", stamp, id.to_lowercase())
}

async fn mount_json(server: &MockServer, url_path: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serves a service index, a catalog index, its pages and their leaves
///
/// Leaves listed in `failing` answer with HTTP 500.
async fn mount_feed(server: &MockServer, pages: &[&[(&str, &str)]], failing: &[&str]) {
    mount_listed_feed(server, pages, failing, &[]).await;
}

/// Like `mount_feed`, but the catalog index lists `listed[n]` as the commit
/// timestamp of page n instead of the page's latest item
async fn mount_listed_feed(
    server: &MockServer,
    pages: &[&[(&str, &str)]],
    failing: &[&str],
    listed: &[&str],
) {
    let base = server.uri();
    let failing: HashSet<&str> = failing.iter().copied().collect();

    mount_json(
        server,
        "/index.json",
        json!({
            "version": "3.0.0",
            "resources": [
                { "@id": format!("{}/search/query", base), "@type": "SearchQueryService" },
                { "@id": format!("{}/catalog/index.json", base), "@type": "Catalog/3.0.0" }
            ]
        }),
    )
    .await;

    let mut page_refs = Vec::new();
    for (n, items) in pages.iter().enumerate() {
        let page_url = format!("{}/catalog/page{}.json", base, n);
        let mut leaves = Vec::new();

        for (id, commit) in items.iter() {
            let url_path = leaf_path(commit, id);
            let leaf_url = format!("{}{}", base, url_path);
            leaves.push(json!({
                "@id": leaf_url,
                "@type": "nuget:PackageDetails",
                "commitId": format!("commit-{}", commit),
                "commitTimeStamp": commit,
                "nuget:id": id,
                "nuget:version": "1.0.0",
            }));

            if failing.contains(id) {
                Mock::given(method("GET"))
                    .and(path(url_path.as_str()))
                    .respond_with(ResponseTemplate::new(500))
                    .mount(server)
                    .await;
            } else {
                mount_json(
                    server,
                    &url_path,
                    json!({ "@id": leaf_url, "id": id, "version": "1.0.0" }),
                )
                .await;
            }
        }

        let max = items.iter().map(|(_, commit)| ts(commit)).max().unwrap();
        let listed_commit = listed.get(n).map_or(max, |commit| ts(commit));
        page_refs.push(json!({
            "@id": page_url,
            "@type": "CatalogPage",
            "count": items.len(),
            "commitTimeStamp": listed_commit.to_string(),
        }));
        mount_json(
            server,
            &format!("/catalog/page{}.json", n),
            json!({ "@id": page_url, "count": items.len(), "items": leaves }),
        )
        .await;
    }

    mount_json(
        server,
        "/catalog/index.json",
        json!({ "@id": format!("{}/catalog/index.json", base), "items": page_refs }),
    )
    .await;
}

fn test_config(server: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.service_index_url = format!("{}/index.json", server.uri());
    config.source.user_agent = Some("catalog-mirror-tests/1.0".to_string());
    config.output.data_dir = data_dir.to_path_buf();
    config.download.parallel_downloads = 4;
    config
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

async fn run(config: &Config) -> Result<CrawlSummary, CatalogError> {
    run_crawl(config.clone(), CancellationToken::new()).await
}

fn read(data_dir: &Path, relative: &str) -> String {
    std::fs::read_to_string(data_dir.join(relative))
        .unwrap_or_else(|e| panic!("missing {}: {}", relative, e))
}

fn stored_cursor(data_dir: &Path, file: &str) -> Option<String> {
    std::fs::read_to_string(data_dir.join(file)).ok()
}

#[tokio::test]
async fn test_full_run_mirrors_every_document() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let summary = run(&config).await.unwrap();

    assert_eq!(summary.cursor, Some(ts("2020-10-22T00:00:00Z")));
    assert_eq!(summary.stop_reason, StopReason::FeedExhausted);
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.leaves_downloaded, 3);
    assert_eq!(request_count(&server).await, 7);

    for file in [
        "127.0.0.1/index.json",
        "127.0.0.1/catalog/index.json",
        "127.0.0.1/catalog/page0.json",
        "127.0.0.1/catalog/page1.json",
        "127.0.0.1/catalog/data/2020.10.20.00.00.00/a.1.0.0.json",
        "127.0.0.1/catalog/data/2020.10.21.00.00.00/b.1.0.0.json",
        "127.0.0.1/catalog/data/2020.10.22.00.00.00/c.1.0.0.json",
    ] {
        assert!(dir.path().join(file).is_file(), "missing {}", file);
    }
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-22T00:00:00+00:00\""
    );
}

#[tokio::test]
async fn test_rerun_without_changes_is_idempotent() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    run(&config).await.unwrap();
    let first_requests = request_count(&server).await;

    let summary = run(&config).await.unwrap();

    // Only the service index and the catalog index are fetched again.
    assert_eq!(request_count(&server).await - first_requests, 2);
    assert_eq!(summary.pages_processed, 0);
    assert_eq!(summary.leaves_downloaded, 0);
    assert_eq!(summary.cursor, Some(ts("2020-10-22T00:00:00Z")));
}

#[tokio::test]
async fn test_max_commits_advances_one_commit_per_run() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.max_commits = Some(1);

    let first = run(&config).await.unwrap();
    assert_eq!(first.stop_reason, StopReason::MaxCommits);
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-20T00:00:00+00:00\""
    );
    assert!(!dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.21.00.00.00/b.1.0.0.json")
        .exists());

    let second = run(&config).await.unwrap();
    assert_eq!(second.cursor, Some(ts("2020-10-21T00:00:00Z")));
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-21T00:00:00+00:00\""
    );
    assert!(!dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.22.00.00.00/c.1.0.0.json")
        .exists());

    let third = run(&config).await.unwrap();
    assert_eq!(third.cursor, Some(ts("2020-10-22T00:00:00Z")));
    assert_eq!(third.stop_reason, StopReason::FeedExhausted);
}

#[tokio::test]
async fn test_commit_group_is_never_split() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        &[&[
            ("A", "2020-10-20T00:00:00Z"),
            ("B", "2020-10-21T00:00:00Z"),
            ("C", "2020-10-21T00:00:00Z"),
        ]],
        &[],
    )
    .await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.max_commits = Some(2);

    let first = run(&config).await.unwrap();
    assert_eq!(first.items_processed, 1);
    assert_eq!(first.cursor, Some(ts("2020-10-20T00:00:00Z")));

    let second = run(&config).await.unwrap();
    assert_eq!(second.items_processed, 2);
    assert_eq!(second.cursor, Some(ts("2020-10-21T00:00:00Z")));
    assert!(dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.21.00.00.00/b.1.0.0.json")
        .is_file());
    assert!(dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.21.00.00.00/c.1.0.0.json")
        .is_file());
}

#[tokio::test]
async fn test_batch_straddling_pages_completes_before_stopping() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        &[
            &[("A", "2020-10-20T00:00:00Z"), ("B", "2020-10-21T00:00:00Z")],
            &[("C", "2020-10-21T00:00:00Z"), ("D", "2020-10-22T00:00:00Z")],
        ],
        &[],
    )
    .await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.max_pages = Some(1);

    let first = run(&config).await.unwrap();

    assert_eq!(first.stop_reason, StopReason::MaxPages);
    assert_eq!(first.pages_processed, 1);
    assert_eq!(first.cursor, Some(ts("2020-10-21T00:00:00Z")));
    assert!(dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.21.00.00.00/c.1.0.0.json")
        .is_file());
    assert!(!dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.22.00.00.00/d.1.0.0.json")
        .exists());

    let second = run(&config).await.unwrap();
    assert_eq!(second.cursor, Some(ts("2020-10-22T00:00:00Z")));
}

#[tokio::test]
async fn test_service_index_depth_stores_one_document() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.depth = DownloadDepth::ServiceIndex;

    let summary = run(&config).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::DepthReached);
    assert_eq!(summary.cursor, None);
    assert_eq!(request_count(&server).await, 1);
    assert!(dir.path().join("127.0.0.1/index.json").is_file());
    assert!(!dir.path().join("127.0.0.1/catalog").exists());
}

#[tokio::test]
async fn test_catalog_page_depth_skips_leaves() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.depth = DownloadDepth::CatalogPage;

    let summary = run(&config).await.unwrap();

    assert_eq!(summary.leaves_downloaded, 0);
    assert_eq!(summary.items_processed, 3);
    assert_eq!(request_count(&server).await, 4);
    assert!(dir.path().join("127.0.0.1/catalog/page1.json").is_file());
    assert!(!dir.path().join("127.0.0.1/catalog/data").exists());
    assert_eq!(
        read(dir.path(), "127.0.0.1/catalog/cursor.download.CatalogPage.json"),
        "\"2020-10-22T00:00:00+00:00\""
    );
    assert_eq!(stored_cursor(dir.path(), CURSOR_FILE), None);
}

#[tokio::test]
async fn test_leaf_failure_keeps_cursor_at_last_safe_commit() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &["B"]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let result = run(&config).await;

    match result {
        Err(CatalogError::Fetch(e)) => {
            assert!(e.url().ends_with("/b.1.0.0.json"));
            assert!(e.is_transient());
        }
        other => panic!("expected a fetch error, got {:?}", other),
    }
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-20T00:00:00+00:00\""
    );
    assert!(!dir.path().join("127.0.0.1/catalog/page1.json").exists());
}

#[tokio::test]
async fn test_formatted_paths() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.output.format_paths = true;

    run(&config).await.unwrap();

    for file in [
        "127.0.0.1/catalog/page0-page499/page0.json",
        "127.0.0.1/catalog/page0-page499/page1.json",
        "127.0.0.1/catalog/data/2020/10/20/00/00.00/a.1.0.0.json",
        "127.0.0.1/catalog/data/2020/10/22/00/00.00/c.1.0.0.json",
    ] {
        assert!(dir.path().join(file).is_file(), "missing {}", file);
    }
    assert!(!dir.path().join("127.0.0.1/catalog/page0.json").exists());
}

#[tokio::test]
async fn test_pretty_json_formatting() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.download.depth = DownloadDepth::CatalogIndex;
    config.output.json_formatting = JsonFormatting::Pretty;

    run(&config).await.unwrap();

    let stored = read(dir.path(), "127.0.0.1/index.json");
    assert!(stored.starts_with("{\n  \"version\": \"3.0.0\""));
    let parsed: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(parsed["resources"][1]["@type"], "Catalog/3.0.0");
}

#[tokio::test]
async fn test_new_commits_are_picked_up_on_the_next_run() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    run(&config).await.unwrap();

    server.reset().await;
    mount_feed(
        &server,
        &[
            &[("A", "2020-10-20T00:00:00Z"), ("B", "2020-10-21T00:00:00Z")],
            &[("C", "2020-10-22T00:00:00Z"), ("D", "2020-10-23T00:00:00Z")],
        ],
        &[],
    )
    .await;

    let summary = run(&config).await.unwrap();

    assert_eq!(summary.cursor, Some(ts("2020-10-23T00:00:00Z")));
    assert_eq!(summary.leaves_downloaded, 1);
    // Service index, catalog index, page1 and the new leaf.
    assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn test_commits_the_index_has_not_listed_are_left_for_later() {
    let server = MockServer::start().await;
    let page0: &[(&str, &str)] = &[("A", "2020-10-20T00:00:00Z"), ("B", "2020-10-21T00:00:00Z")];
    mount_listed_feed(&server, &[page0], &[], &["2020-10-20T00:00:00Z"]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let first = run(&config).await.unwrap();

    assert_eq!(first.cursor, Some(ts("2020-10-20T00:00:00Z")));
    assert_eq!(first.leaves_downloaded, 1);
    assert!(!dir
        .path()
        .join("127.0.0.1/catalog/data/2020.10.21.00.00.00/b.1.0.0.json")
        .exists());
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-20T00:00:00+00:00\""
    );

    // The rest of the 21st commit is published on a second page.
    let page1: &[(&str, &str)] = &[("C", "2020-10-21T00:00:00Z")];
    server.reset().await;
    mount_feed(&server, &[page0, page1], &[]).await;

    let second = run(&config).await.unwrap();

    assert_eq!(second.cursor, Some(ts("2020-10-21T00:00:00Z")));
    assert_eq!(second.leaves_downloaded, 2);
    for file in [
        "127.0.0.1/catalog/data/2020.10.21.00.00.00/b.1.0.0.json",
        "127.0.0.1/catalog/data/2020.10.21.00.00.00/c.1.0.0.json",
    ] {
        assert!(dir.path().join(file).is_file(), "missing {}", file);
    }
    assert_eq!(
        read(dir.path(), CURSOR_FILE),
        "\"2020-10-21T00:00:00+00:00\""
    );
}

#[tokio::test]
async fn test_leaf_count_report_sees_every_page() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let mut engine = CrawlEngine::from_config_with_visitor(
        config,
        ReportAggregator::new(LeafCountVisitor::new()),
        CancellationToken::new(),
    )
    .unwrap();
    engine.run().await.unwrap();

    let report = engine.into_visitor();
    assert_eq!(report.name(), "CatalogLeafCount");
    assert_eq!(report.pages_visited(), 2);
    let hours: Vec<String> = report
        .rows()
        .iter()
        .map(|(hour, count)| format!("{} {}", hour.format("%Y-%m-%dT%H"), count))
        .collect();
    assert_eq!(
        hours,
        vec!["2020-10-20T00 1", "2020-10-21T00 1", "2020-10-22T00 1"]
    );
}

#[tokio::test]
async fn test_cancelled_run_writes_no_cursor() {
    let server = MockServer::start().await;
    mount_feed(&server, TWO_PAGES, &[]).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_crawl(config, cancel).await;

    assert!(matches!(result, Err(CatalogError::Cancelled)));
    assert_eq!(stored_cursor(dir.path(), CURSOR_FILE), None);
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_service_index_without_catalog_is_malformed() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/index.json",
        json!({ "version": "3.0.0", "resources": [] }),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let result = run(&config).await;

    assert!(matches!(
        result,
        Err(CatalogError::MalformedDocument { .. })
    ));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_missing_service_index_fails_without_cursor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let result = run(&config).await;

    assert!(matches!(
        result,
        Err(CatalogError::Fetch(catalog_mirror::FetchError::Status { status: 404, .. }))
    ));
    assert_eq!(stored_cursor(dir.path(), CURSOR_FILE), None);
}
