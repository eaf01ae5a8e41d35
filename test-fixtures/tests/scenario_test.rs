//! End-to-end matching scenarios over a local HTTP fixture, a temp cache
//! directory, and the deterministic stub encoder.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_cache::{url_hash, EmbeddingCache};
use atelier_core::config::MatchConfig;
use atelier_core::models::{AggregationStrategy, ArtistProfile};
use atelier_core::traits::IClipEncoder;
use atelier_fetch::{ImageFetcher, RetryPolicy};
use atelier_matching::{CancelFlag, MatchingEngine};
use test_fixtures::{png_bytes, unit_axis, vector_with_cosine, StubEncoder};

const BRIEF: &str = "whimsical watercolor picture book";

/// Colors with programmed cosines against the brief's query vector.
const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const BLUE: [u8; 3] = [0, 0, 255];
const GRAY: [u8; 3] = [9, 9, 9];

fn programmed_encoder() -> StubEncoder {
    StubEncoder::new()
        .with_text(BRIEF, unit_axis(0))
        .with_color(RED, vector_with_cosine(0.8)) // score 0.9
        .with_color(GREEN, vector_with_cosine(0.6)) // score 0.8
        .with_color(BLUE, vector_with_cosine(0.4)) // score 0.7
        .with_color(GRAY, vector_with_cosine(-0.8)) // score 0.1
}

fn engine_at(cache_dir: &Path, strategy: AggregationStrategy) -> MatchingEngine {
    test_fixtures::init_tracing();
    let mut config = MatchConfig::default();
    config.cache_dir = cache_dir.to_path_buf();
    config.download_timeout = Duration::from_millis(100);
    config.strategy = strategy;

    let encoder: Arc<dyn IClipEncoder> = Arc::new(programmed_encoder());
    let cache = EmbeddingCache::open(&config.cache_dir, encoder.model_name()).unwrap();
    let fetcher = ImageFetcher::new(&config)
        .with_retry(RetryPolicy::new(vec![Duration::from_millis(5), Duration::from_millis(5)]));
    MatchingEngine::with_parts(config, fetcher, encoder, cache)
}

async fn mount_png(server: &MockServer, route: &str, color: [u8; 3]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(color, 8)),
        )
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn warm_cache_serves_second_init_without_http() {
    let server = MockServer::start().await;
    mount_png(&server, "/u1.png", RED).await;
    mount_png(&server, "/u2.png", GREEN).await;
    let dir = tempfile::tempdir().unwrap();

    let u1 = format!("{}/u1.png", server.uri());
    let u2 = format!("{}/u2.png", server.uri());
    let artist = ArtistProfile::new(1, "Mika", vec![u1.clone(), u2.clone()]);

    {
        let engine = engine_at(dir.path(), AggregationStrategy::Max);
        let report = engine.ingest(vec![artist.clone()]).await.unwrap();
        assert_eq!(report.images_embedded, 2);
        assert_eq!(report.cache_misses, 2);
    }
    assert_eq!(request_count(&server).await, 2);

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    let report = engine.ingest(vec![artist]).await.unwrap();
    assert_eq!(report.cache_hits, 2, "second init must be all cache hits");
    assert_eq!(request_count(&server).await, 2, "no HTTP on a warm cache");

    assert_eq!(engine.cache().get(&u1).unwrap(), vector_with_cosine(0.8));
    assert_eq!(engine.cache().get(&u2).unwrap(), vector_with_cosine(0.6));
}

#[tokio::test]
async fn partial_failure_keeps_artist_with_surviving_images() {
    let server = MockServer::start().await;
    mount_png(&server, "/good.png", RED).await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(BLUE, 8))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    let report = engine
        .ingest(vec![ArtistProfile::new(
            2,
            "Jo",
            vec![
                format!("{}/good.png", server.uri()),
                format!("{}/gone.png", server.uri()),
                format!("{}/slow.png", server.uri()),
            ],
        )])
        .await
        .unwrap();

    assert_eq!(report.images_embedded, 1);
    assert_eq!(report.images_failed, 2);
    assert_eq!(report.artists_indexed, 1);

    let results = engine.recommend(BRIEF, 5).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].artist_id, 2);
    assert_eq!(results[0].num_illustrations, 1);
    assert!((results[0].score - 0.9).abs() < 1e-4);
}

#[tokio::test]
async fn total_failure_excludes_artist_from_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    let report = engine
        .ingest(vec![ArtistProfile::new(
            3,
            "Nobody",
            vec![
                format!("{}/a.png", server.uri()),
                format!("{}/b.png", server.uri()),
            ],
        )])
        .await
        .unwrap();

    assert_eq!(report.artists_indexed, 0);
    assert_eq!(report.artists_excluded, 1);

    let results = engine.recommend(BRIEF, 5).unwrap();
    assert!(results.is_empty(), "artist 3 must never appear");
}

#[tokio::test]
async fn each_strategy_aggregates_the_documented_value() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", RED).await;
    mount_png(&server, "/b.png", GREEN).await;
    mount_png(&server, "/c.png", BLUE).await;
    mount_png(&server, "/d.png", GRAY).await;
    let dir = tempfile::tempdir().unwrap();

    let artist = ArtistProfile::new(
        4,
        "Quad",
        vec![
            format!("{}/a.png", server.uri()),
            format!("{}/b.png", server.uri()),
            format!("{}/c.png", server.uri()),
            format!("{}/d.png", server.uri()),
        ],
    );

    // Per-illustration scores are [0.9, 0.8, 0.7, 0.1] against the brief.
    let expectations = [
        (AggregationStrategy::Max, 0.9f32),
        (AggregationStrategy::Mean, 0.625),
        (AggregationStrategy::TopKMean, 0.8),
        (AggregationStrategy::WeightedMean, 0.78),
    ];

    for (strategy, expected) in expectations {
        let engine = engine_at(dir.path(), strategy);
        engine.ingest(vec![artist.clone()]).await.unwrap();
        let results = engine.recommend(BRIEF, 1).unwrap();
        assert!(
            (results[0].score - expected).abs() < 1e-3,
            "{strategy:?}: expected {expected}, got {}",
            results[0].score
        );
        assert_eq!(results[0].aggregation_strategy, strategy);
        assert_eq!(
            results[0].top_illustration_url,
            format!("{}/a.png", server.uri()),
            "argmax is strategy-independent"
        );
    }
}

#[tokio::test]
async fn exact_ties_rank_by_ascending_artist_id() {
    let server = MockServer::start().await;
    mount_png(&server, "/same.png", RED).await;
    let dir = tempfile::tempdir().unwrap();

    let url = format!("{}/same.png", server.uri());
    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    engine
        .ingest(vec![
            ArtistProfile::new(10, "Later", vec![url.clone()]),
            ArtistProfile::new(2, "Earlier", vec![url]),
        ])
        .await
        .unwrap();

    let results = engine.recommend(BRIEF, 2).unwrap();
    assert_eq!(results[0].artist_id, 2);
    assert_eq!(results[1].artist_id, 10);
    assert_eq!(results[0].score, results[1].score, "identical portfolios score identically");
}

#[tokio::test]
async fn corrupt_vector_file_is_refetched_on_next_init() {
    let server = MockServer::start().await;
    mount_png(&server, "/u1.png", RED).await;
    mount_png(&server, "/u2.png", GREEN).await;
    let dir = tempfile::tempdir().unwrap();

    let u1 = format!("{}/u1.png", server.uri());
    let u2 = format!("{}/u2.png", server.uri());
    let artist = ArtistProfile::new(6, "Rei", vec![u1.clone(), u2.clone()]);

    {
        let engine = engine_at(dir.path(), AggregationStrategy::Max);
        engine.ingest(vec![artist.clone()]).await.unwrap();
    }
    assert_eq!(request_count(&server).await, 2);

    // Truncate u1's vector file between runs.
    let victim = dir.path().join(format!("{}.vec", url_hash(&u1)));
    let bytes = fs::read(&victim).unwrap();
    fs::write(&victim, &bytes[..1024]).unwrap();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    let report = engine.ingest(vec![artist]).await.unwrap();

    assert_eq!(request_count(&server).await, 3, "only the corrupt URL re-fetches");
    assert_eq!(report.cache_hits, 1);
    assert_eq!(report.cache_misses, 1);
    assert_eq!(engine.cache().get(&u1).unwrap(), vector_with_cosine(0.8));
    assert_eq!(engine.cache_stats().entries, 2);
}

#[tokio::test]
async fn queries_before_any_ingest_return_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    assert!(engine.recommend(BRIEF, 5).unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_ingest_publishes_nothing() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", RED).await;
    let dir = tempfile::tempdir().unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    let report = engine
        .ingest_with_cancel(
            vec![ArtistProfile::new(7, "Cut", vec![format!("{}/a.png", server.uri())])],
            cancel,
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.artists_indexed, 0);
    assert_eq!(request_count(&server).await, 0, "cancelled fetches never start");
    assert!(engine.recommend(BRIEF, 5).unwrap().is_empty());
}

#[tokio::test]
async fn reload_replaces_the_served_index() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", RED).await;
    mount_png(&server, "/b.png", GREEN).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    engine
        .ingest(vec![ArtistProfile::new(1, "First", vec![format!("{}/a.png", server.uri())])])
        .await
        .unwrap();
    assert_eq!(engine.recommend(BRIEF, 5).unwrap()[0].artist_id, 1);

    engine
        .reload(vec![ArtistProfile::new(2, "Second", vec![format!("{}/b.png", server.uri())])])
        .await
        .unwrap();
    let results = engine.recommend(BRIEF, 5).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].artist_id, 2);
}

#[tokio::test]
async fn stats_track_queries_and_processing() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", RED).await;
    Mock::given(method("GET"))
        .and(path("/bad.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let engine = engine_at(dir.path(), AggregationStrategy::Max);
    engine
        .ingest(vec![ArtistProfile::new(
            1,
            "Stat",
            vec![
                format!("{}/a.png", server.uri()),
                format!("{}/bad.png", server.uri()),
            ],
        )])
        .await
        .unwrap();

    engine.recommend(BRIEF, 5).unwrap();
    engine.recommend(BRIEF, 5).unwrap();

    let stats = engine.stats();
    assert_eq!(stats.artists_indexed, 1);
    assert!((stats.processing_success_rate - 0.5).abs() < 1e-9);
    assert!((stats.avg_score - 0.9).abs() < 1e-3);
    assert!(stats.avg_latency_ms >= 0.0);

    let cache_stats = engine.cache_stats();
    assert_eq!(cache_stats.entries, 1);
}
