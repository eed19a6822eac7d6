//! Integration tests for the download engine: concurrency bounds, output
//! ordering, partial failure accounting, cancellation, and a wiremock-backed
//! end-to-end run through the JSON catalog resolver.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webtoon_dl_core::{
    Chapter, ChapterOutcome, ChapterResolver, DownloadConfig, DownloadEngine, DownloadOptions,
    FetchError, Fetcher, HttpClient, ImageFormat, ImageReference, JsonCatalogResolver,
    MetadataFormat, OutputMode, PageClient, ResolveError, RetryPolicy, RunError, RunStatus, Work,
};

// ==================== Shared Fixtures ====================

/// A 2x2 PNG generated in-memory so tests carry no fixture files.
fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([120, 40, 200]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut out),
            image::ImageFormat::Png,
        )
        .unwrap();
    out
}

/// In-memory resolver over a fixed catalog; image URLs go through the real
/// fetcher so the stub client decides their fate.
struct StaticResolver {
    work: Work,
    pages: HashMap<u32, Vec<String>>,
}

impl StaticResolver {
    fn new(chapters: u32, images_per_chapter: usize) -> Self {
        let mut pages = HashMap::new();
        let chapters: Vec<Chapter> = (1..=chapters)
            .map(|ordinal| {
                pages.insert(
                    ordinal,
                    (0..images_per_chapter)
                        .map(|i| format!("http://test/ch{ordinal}/{i}.png"))
                        .collect(),
                );
                Chapter {
                    ordinal,
                    title: format!("Chapter {ordinal}"),
                    url: format!("http://test/ch{ordinal}"),
                }
            })
            .collect();
        Self {
            work: Work {
                id: "w1".to_string(),
                title: "Fixture".to_string(),
                source: "http://test/series".to_string(),
                chapters,
            },
            pages,
        }
    }
}

#[async_trait]
impl ChapterResolver for StaticResolver {
    async fn resolve_catalog(&self, _fetcher: &Fetcher) -> Result<Work, ResolveError> {
        Ok(self.work.clone())
    }

    async fn resolve_pages(
        &self,
        _fetcher: &Fetcher,
        chapter: &Chapter,
    ) -> Result<Vec<ImageReference>, ResolveError> {
        let urls = self
            .pages
            .get(&chapter.ordinal)
            .ok_or_else(|| ResolveError::Fetch(FetchError::http_status(&chapter.url, 404)))?;
        Ok(urls
            .iter()
            .enumerate()
            .map(|(index, url)| ImageReference::new(index, url.clone()))
            .collect())
    }
}

fn config(root: &Path, mode: OutputMode, concurrency: usize) -> DownloadConfig {
    DownloadConfig::from_options(DownloadOptions {
        source: "http://test/series".to_string(),
        latest: false,
        start: None,
        end: None,
        output_root: root.to_path_buf(),
        output_mode: mode,
        image_format: (mode == OutputMode::Images).then_some(ImageFormat::Png),
        quality: None,
        concurrency,
        export_metadata: false,
        metadata_format: MetadataFormat::Json,
    })
    .unwrap()
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2), 2.0)
}

// ==================== Concurrency Bound ====================

/// Client that records the high-water mark of simultaneous in-flight gets.
struct InstrumentedClient {
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    payload: Vec<u8>,
}

impl InstrumentedClient {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            payload,
        }
    }
}

#[async_trait]
impl PageClient for InstrumentedClient {
    async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(current, Ordering::SeqCst);
        // Hold the slot long enough for contention to show up
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

#[tokio::test]
async fn test_in_flight_fetches_never_exceed_configured_bound() {
    let root = tempfile::tempdir().unwrap();
    let client = Arc::new(InstrumentedClient::new(tiny_png()));
    let (engine, _rx) = DownloadEngine::new(
        config(root.path(), OutputMode::Images, 3),
        Arc::clone(&client) as Arc<dyn PageClient>,
        fast_policy(),
    );

    let result = engine.run(Arc::new(StaticResolver::new(4, 10))).await;

    assert!(result.is_full_success());
    let high_water = client.high_water.load(Ordering::SeqCst);
    assert!(high_water <= 3, "high-water mark was {high_water}");
    // The bound should actually be exercised, not just never reached
    assert!(high_water >= 2, "high-water mark was {high_water}");
}

// ==================== Output Ordering ====================

/// Client whose responses complete in reverse request order.
struct ReversingClient {
    payload: Vec<u8>,
}

#[async_trait]
impl PageClient for ReversingClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // Later pages respond sooner: completion order inverts page order.
        let index: u64 = url
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".png"))
            .and_then(|stem| stem.parse().ok())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40_u64.saturating_sub(index * 5))).await;
        Ok(self.payload.clone())
    }
}

#[tokio::test]
async fn test_completion_order_does_not_affect_page_order() {
    let root = tempfile::tempdir().unwrap();
    let (engine, _rx) = DownloadEngine::new(
        config(root.path(), OutputMode::Archive, 8),
        Arc::new(ReversingClient { payload: tiny_png() }),
        fast_policy(),
    );

    let result = engine.run(Arc::new(StaticResolver::new(1, 8))).await;

    assert!(result.is_full_success());
    let archive_path = result.chapters[0].output_path.clone().unwrap();
    let archive =
        zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let names: Vec<String> = archive.file_names().map(ToString::to_string).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted, "archive entries out of page order");
    assert_eq!(names.len(), 8);
}

// ==================== Partial Failure ====================

/// Client that permanently fails a fixed set of URLs.
struct SelectiveClient {
    payload: Vec<u8>,
    broken: Vec<String>,
}

#[async_trait]
impl PageClient for SelectiveClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.broken.iter().any(|b| b == url) {
            return Err(FetchError::http_status(url, 404));
        }
        Ok(self.payload.clone())
    }
}

#[tokio::test]
async fn test_two_of_ten_failed_images_yield_partial_chapter_completed_run() {
    let root = tempfile::tempdir().unwrap();
    let (engine, _rx) = DownloadEngine::new(
        config(root.path(), OutputMode::Images, 4),
        Arc::new(SelectiveClient {
            payload: tiny_png(),
            broken: vec![
                "http://test/ch1/3.png".to_string(),
                "http://test/ch1/7.png".to_string(),
            ],
        }),
        fast_policy(),
    );

    let result = engine.run(Arc::new(StaticResolver::new(1, 10))).await;

    assert!(!result.status.is_fatal());
    let report = &result.chapters[0];
    assert_eq!(report.outcome, ChapterOutcome::PartiallyFailed);
    assert_eq!(report.images_total, 10);
    assert_eq!(report.images_fetched, 8);

    let dir = report.output_path.clone().unwrap();
    let written = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(written, 8);
    assert!(!dir.join("0003.png").exists());
    assert!(!dir.join("0007.png").exists());
}

// ==================== Discovery Failure ====================

struct FailingResolver;

#[async_trait]
impl ChapterResolver for FailingResolver {
    async fn resolve_catalog(&self, _fetcher: &Fetcher) -> Result<Work, ResolveError> {
        Err(ResolveError::Fetch(FetchError::http_status(
            "http://test/series",
            500,
        )))
    }

    async fn resolve_pages(
        &self,
        _fetcher: &Fetcher,
        _chapter: &Chapter,
    ) -> Result<Vec<ImageReference>, ResolveError> {
        unreachable!("discovery failed")
    }
}

#[tokio::test]
async fn test_discovery_failure_is_fatal_with_zero_chapters() {
    let root = tempfile::tempdir().unwrap();
    let (engine, _rx) = DownloadEngine::new(
        config(root.path(), OutputMode::Images, 4),
        Arc::new(SelectiveClient {
            payload: Vec::new(),
            broken: Vec::new(),
        }),
        fast_policy(),
    );

    let result = engine.run(Arc::new(FailingResolver)).await;

    assert!(matches!(
        result.status,
        RunStatus::Failed(RunError::Discovery { .. })
    ));
    assert!(result.chapters.is_empty());
    // Nothing was written
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

// ==================== Cancellation ====================

/// Client that blocks until the shared token is cancelled, then fails.
struct BlockingClient {
    cancel: CancellationToken,
    started: AtomicUsize,
}

#[async_trait]
impl PageClient for BlockingClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancelled().await;
        Err(FetchError::cancelled(url))
    }
}

#[tokio::test]
async fn test_cancellation_leaves_no_partial_archive() {
    let root = tempfile::tempdir().unwrap();
    let cancel_seen = CancellationToken::new();
    let client = Arc::new(BlockingClient {
        cancel: cancel_seen.clone(),
        started: AtomicUsize::new(0),
    });
    let (engine, _rx) = DownloadEngine::new(
        config(root.path(), OutputMode::Archive, 4),
        Arc::clone(&client) as Arc<dyn PageClient>,
        fast_policy(),
    );
    let cancel = engine.cancel_token();

    let run = {
        let resolver = Arc::new(StaticResolver::new(2, 4));
        tokio::spawn(async move { engine.run(resolver).await })
    };

    // Wait for fetches to be in flight, then cancel the run
    while client.started.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    cancel.cancel();
    cancel_seen.cancel();

    let result = run.await.unwrap();

    assert!(matches!(
        result.status,
        RunStatus::Failed(RunError::Cancelled)
    ));
    // No finished or half-written archive at any final path
    let archives = std::fs::read_dir(root.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "cbz")
        })
        .count();
    assert_eq!(archives, 0);
}

// ==================== End-to-End via Mock Server ====================

async fn mount_catalog(server: &MockServer) {
    let base = server.uri();
    let catalog_page_1 = serde_json::json!({
        "id": "tower",
        "title": "The Tower",
        "chapters": [
            { "ordinal": 1, "title": "One", "url": format!("{base}/chapters/1") },
        ],
        "next_page": 2,
    });
    let catalog_page_2 = serde_json::json!({
        "id": "tower",
        "title": "The Tower",
        "chapters": [
            { "ordinal": 2, "title": "Two", "url": format!("{base}/chapters/2") },
        ],
        "next_page": null,
    });

    Mock::given(method("GET"))
        .and(path("/series"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_page_2))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_page_1))
        .mount(server)
        .await;

    for chapter in 1..=2 {
        let pages = serde_json::json!({
            "images": [
                format!("{base}/img/{chapter}-0.png"),
                format!("{base}/img/{chapter}-1.png"),
            ],
        });
        Mock::given(method("GET"))
            .and(path(format!("/chapters/{chapter}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(pages))
            .mount(server)
            .await;
        for index in 0..2 {
            Mock::given(method("GET"))
                .and(path(format!("/img/{chapter}-{index}.png")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(tiny_png()))
                .mount(server)
                .await;
        }
    }
}

#[tokio::test]
async fn test_end_to_end_run_against_mock_server() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let root = tempfile::tempdir().unwrap();
    let source = format!("{}/series", server.uri());
    let cfg = DownloadConfig::from_options(DownloadOptions {
        source: source.clone(),
        latest: false,
        start: None,
        end: None,
        output_root: root.path().to_path_buf(),
        output_mode: OutputMode::Images,
        image_format: Some(ImageFormat::Jpg),
        quality: Some(80),
        concurrency: 4,
        export_metadata: true,
        metadata_format: MetadataFormat::Both,
    })
    .unwrap();

    let (engine, _rx) = DownloadEngine::new(cfg, HttpClient::new().shared(), fast_policy());
    let result = engine
        .run(Arc::new(JsonCatalogResolver::new(source)))
        .await;

    assert!(result.is_full_success(), "run failed: {:?}", result.status);
    assert_eq!(result.chapters.len(), 2);

    // Re-encoded to JPEG in directory mode
    assert!(root.path().join("0001-One").join("0000.jpg").exists());
    assert!(root.path().join("0002-Two").join("0001.jpg").exists());

    // Metadata reports written in both formats
    let metadata: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.path().join("metadata.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["title"], "The Tower");
    assert_eq!(metadata["chapters"][0]["outcome"], "succeeded");
    assert!(root.path().join("metadata.txt").exists());
}

#[tokio::test]
async fn test_end_to_end_transient_errors_are_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    let catalog = serde_json::json!({
        "id": "w",
        "title": "W",
        "chapters": [
            { "ordinal": 1, "title": "One", "url": format!("{base}/chapters/1") },
        ],
        "next_page": null,
    });
    Mock::given(method("GET"))
        .and(path("/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chapters/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "images": [format!("{base}/img/flaky.png")],
        })))
        .mount(&server)
        .await;
    // First two attempts 503, then success
    Mock::given(method("GET"))
        .and(path("/img/flaky.png"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/flaky.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tiny_png()))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let source = format!("{base}/series");
    let mut cfg = config(root.path(), OutputMode::Archive, 2);
    cfg.source.clone_from(&source);

    let (engine, _rx) = DownloadEngine::new(cfg, HttpClient::new().shared(), fast_policy());
    let result = engine
        .run(Arc::new(JsonCatalogResolver::new(source)))
        .await;

    assert!(result.is_full_success(), "run failed: {:?}", result.status);
    assert!(root.path().join("0001-One.cbz").exists());
}
