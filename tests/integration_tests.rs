use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tube_metadata::config::ExtractConfig;
use tube_metadata::{
    AttributeMap, CollectorError, ConfigBuilder, DocumentSource, MetaExtractor,
    MetadataCollector, StoreFile,
};

/// In-memory pages; ids listed in `failing` return a network-style error
struct FakePages {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakePages {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(id, html)| (id.to_string(), html.to_string()))
                .collect(),
            failing: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, video_id: &str) -> Self {
        self.failing.insert(video_id.to_string());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSource for FakePages {
    async fn fetch_document(&self, video_id: &str) -> tube_metadata::Result<String> {
        self.requests.lock().unwrap().push(video_id.to_string());
        if self.failing.contains(video_id) {
            return Err(CollectorError::HttpStatus {
                status: 503,
                url: self.location(video_id),
            });
        }
        Ok(self.pages.get(video_id).cloned().unwrap_or_default())
    }

    fn location(&self, video_id: &str) -> String {
        format!("fake://watch?v={}", video_id)
    }
}

fn page(title: &str, duration: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head>
        <meta itemprop="name" content="{}">
        <meta itemprop="duration" content="{}">
        <meta property="og:type" content="video.other">
        </head><body></body></html>"#,
        title, duration
    )
}

fn collector(source: FakePages) -> MetadataCollector<FakePages> {
    MetadataCollector::new(
        source,
        MetaExtractor::from_config(&ExtractConfig::default()).unwrap(),
    )
}

fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn store_in(temp_dir: &TempDir) -> StoreFile {
    StoreFile::new(temp_dir.path().join("data/metadata/video/video_metadata_20240101.json"))
}

#[tokio::test]
async fn test_bootstrap_from_missing_store() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    let pages_a = page("Video A", "PT1M");
    let pages_b = page("Video B", "PT2M");
    let collector = collector(FakePages::new(&[("A", pages_a.as_str()), ("B", pages_b.as_str())]));

    let summary = collector.run(["A", "B"], &store_file).await.unwrap();

    assert_eq!(summary.fetched, vec!["A", "B"]);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.store_path, store_file.path());

    let store = store_file.read_existing().await.unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get("A"),
        Some(&attrs(&[("duration", "PT1M"), ("name", "Video A")]))
    );
}

#[tokio::test]
async fn test_bootstrap_from_zero_byte_store() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    store_file.ensure_dir().await.unwrap();
    fs::write(store_file.path(), b"").await.unwrap();

    let html = page("Video A", "PT1M");
    let collector = collector(FakePages::new(&[("A", html.as_str())]));
    let summary = collector.run(["A"], &store_file).await.unwrap();

    assert_eq!(summary.fetched, vec!["A"]);
    assert!(store_file.read_existing().await.unwrap().contains("A"));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    let html_a = page("Video A", "PT1M");
    let html_b = page("Video B", "PT2M");

    let first = collector(FakePages::new(&[("A", html_a.as_str()), ("B", html_b.as_str())]));
    first.run(["A", "B"], &store_file).await.unwrap();
    let after_first = fs::read(store_file.path()).await.unwrap();

    let second = collector(FakePages::new(&[("A", html_a.as_str()), ("B", html_b.as_str())]));
    let summary = second.run(["A", "B"], &store_file).await.unwrap();
    let after_second = fs::read(store_file.path()).await.unwrap();

    assert!(summary.fetched.is_empty());
    assert_eq!(summary.skipped, vec!["A", "B"]);
    assert!(second.source().requests().is_empty());
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_incremental_progress_only_fetches_new_ids() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    store_file.ensure_dir().await.unwrap();
    fs::write(
        store_file.path(),
        r#"{"A": {"name": "Old A"}, "B": {"name": "Old B", "genre": "Music"}}"#,
    )
    .await
    .unwrap();

    let html_a = page("New A", "PT9M");
    let html_c = page("Video C", "PT3M");
    let collector = collector(FakePages::new(&[("A", html_a.as_str()), ("C", html_c.as_str())]));

    let summary = collector.run(["A", "B", "C"], &store_file).await.unwrap();

    assert_eq!(summary.fetched, vec!["C"]);
    assert_eq!(summary.skipped, vec!["A", "B"]);
    assert_eq!(collector.source().requests(), vec!["C"]);

    let store = store_file.read_existing().await.unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.get("A"), Some(&attrs(&[("name", "Old A")])));
    assert_eq!(
        store.get("B"),
        Some(&attrs(&[("genre", "Music"), ("name", "Old B")]))
    );
    assert_eq!(store.get("C").map(|a| a["name"].as_str()), Some("Video C"));
}

#[tokio::test]
async fn test_failure_keeps_earlier_flushes_and_next_run_resumes() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    let html_a = page("Video A", "PT1M");
    let html_b = page("Video B", "PT2M");
    let html_c = page("Video C", "PT3M");

    let broken = collector(
        FakePages::new(&[("A", html_a.as_str()), ("B", html_b.as_str()), ("C", html_c.as_str())]).failing_on("B"),
    );
    let err = broken.run(["A", "B", "C"], &store_file).await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(broken.source().requests(), vec!["A", "B"]);

    let partial = store_file.read_existing().await.unwrap();
    assert_eq!(partial.len(), 1);
    assert!(partial.contains("A"));

    let healthy = collector(FakePages::new(&[("A", html_a.as_str()), ("B", html_b.as_str()), ("C", html_c.as_str())]));
    let summary = healthy.run(["A", "B", "C"], &store_file).await.unwrap();

    assert_eq!(summary.skipped, vec!["A"]);
    assert_eq!(summary.fetched, vec!["B", "C"]);
    let store = store_file.read_existing().await.unwrap();
    assert_eq!(store.get("A"), partial.get("A"));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_malformed_store_aborts_without_fetching() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    store_file.ensure_dir().await.unwrap();
    fs::write(store_file.path(), b"{ not json").await.unwrap();

    let html = page("Video A", "PT1M");
    let collector = collector(FakePages::new(&[("A", html.as_str())]));
    let err = collector.run(["A"], &store_file).await.unwrap_err();

    assert!(matches!(err, CollectorError::Parse { .. }));
    assert!(collector.source().requests().is_empty());
    assert_eq!(fs::read(store_file.path()).await.unwrap(), b"{ not json");
}

#[tokio::test]
async fn test_page_without_attributes_is_recorded_and_then_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    let bare = "<html><head><meta charset=\"utf-8\"></head></html>";

    let first = collector(FakePages::new(&[("E", bare)]));
    first.run(["E"], &store_file).await.unwrap();
    let store = store_file.read_existing().await.unwrap();
    assert_eq!(store.get("E"), Some(&AttributeMap::new()));

    let second = collector(FakePages::new(&[("E", page("Now rich", "PT1M").as_str())]));
    let summary = second.run(["E"], &store_file).await.unwrap();
    assert_eq!(summary.skipped, vec!["E"]);
    assert!(second.source().requests().is_empty());
}

#[tokio::test]
async fn test_store_file_layout() {
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);
    let html = r#"<meta itemprop="b" content="2"><meta itemprop="a" content="1">"#;

    collector(FakePages::new(&[("Z", html), ("Y", html)]))
        .run(["Z", "Y"], &store_file)
        .await
        .unwrap();

    let on_disk = fs::read_to_string(store_file.path()).await.unwrap();
    let expected = [
        "{",
        "    \"Y\": {",
        "        \"a\": \"1\",",
        "        \"b\": \"2\"",
        "    },",
        "    \"Z\": {",
        "        \"a\": \"1\",",
        "        \"b\": \"2\"",
        "    }",
        "}",
    ]
    .join("\n");
    assert_eq!(on_disk, expected);
}

/// Answers a single HTTP request with a canned response and hands back the
/// raw request text
async fn serve_once(
    status_line: &'static str,
    body: impl Into<Vec<u8>>,
) -> (String, tokio::task::JoinHandle<String>) {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "{}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{}/watch", addr), handle)
}

#[tokio::test]
async fn test_http_fetcher_end_to_end() {
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", page("Served", "PT7M")).await;
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);

    let config = ConfigBuilder::new()
        .with_base_url(base_url)
        .with_timeout(5)
        .use_system_proxy(false)
        .build();
    let collector = MetadataCollector::from_config(&config).unwrap();

    let summary = collector.run(["abc123"], &store_file).await.unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /watch?v=abc123 HTTP/1.1"));
    assert_eq!(summary.fetched, vec!["abc123"]);
    let store = store_file.read_existing().await.unwrap();
    assert_eq!(
        store.get("abc123"),
        Some(&attrs(&[("duration", "PT7M"), ("name", "Served")]))
    );
}

#[tokio::test]
async fn test_invalid_utf8_body_is_decoded_lossily() {
    let mut body = b"<html><head><meta itemprop=\"name\" content=\"Caf".to_vec();
    body.push(0xE9);
    body.extend_from_slice(b"\"></head></html>");
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", body).await;
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);

    let config = ConfigBuilder::new()
        .with_base_url(base_url)
        .with_timeout(5)
        .use_system_proxy(false)
        .build();
    let collector = MetadataCollector::from_config(&config).unwrap();

    let summary = collector.run(["latin1"], &store_file).await.unwrap();
    server.await.unwrap();

    assert_eq!(summary.fetched, vec!["latin1"]);
    let store = store_file.read_existing().await.unwrap();
    assert_eq!(
        store.get("latin1"),
        Some(&attrs(&[("name", "Caf\u{FFFD}")]))
    );
}

#[tokio::test]
async fn test_http_error_status_is_fatal() {
    let (base_url, server) = serve_once("HTTP/1.1 404 Not Found", "gone".to_string()).await;
    let temp_dir = TempDir::new().unwrap();
    let store_file = store_in(&temp_dir);

    let config = ConfigBuilder::new()
        .with_base_url(base_url)
        .with_timeout(5)
        .use_system_proxy(false)
        .build();
    let collector = MetadataCollector::from_config(&config).unwrap();

    let err = collector.run(["missing"], &store_file).await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, CollectorError::HttpStatus { status: 404, .. }));
    assert!(store_file.read_existing().await.unwrap().is_empty());
}
