//! Atomic counters behind the facade's `stats()` operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use atelier_core::models::{EngineStats, Recommendation};

/// Engine-lifetime counters. All fields are atomics so recording never
/// contends with queries.
pub struct EngineMetrics {
    started: Instant,
    queries: AtomicU64,
    latency_us_total: AtomicU64,
    results_returned: AtomicU64,
    score_micros_total: AtomicU64,
    images_embedded: AtomicU64,
    images_failed: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            queries: AtomicU64::new(0),
            latency_us_total: AtomicU64::new(0),
            results_returned: AtomicU64::new(0),
            score_micros_total: AtomicU64::new(0),
            images_embedded: AtomicU64::new(0),
            images_failed: AtomicU64::new(0),
        }
    }

    /// Record one served query and the scores it returned.
    pub fn record_query(&self, latency: Duration, results: &[Recommendation]) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.results_returned
            .fetch_add(results.len() as u64, Ordering::Relaxed);
        for result in results {
            self.score_micros_total
                .fetch_add((result.score as f64 * 1_000_000.0) as u64, Ordering::Relaxed);
        }
    }

    /// Record one ingestion run's per-image outcome counts.
    pub fn record_ingest(&self, embedded: u64, failed: u64) {
        self.images_embedded.fetch_add(embedded, Ordering::Relaxed);
        self.images_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Fold the counters into the facade-facing snapshot.
    pub fn snapshot(&self, artists_indexed: usize, cache_hit_rate: f64) -> EngineStats {
        let queries = self.queries.load(Ordering::Relaxed);
        let results = self.results_returned.load(Ordering::Relaxed);
        let embedded = self.images_embedded.load(Ordering::Relaxed);
        let failed = self.images_failed.load(Ordering::Relaxed);
        let attempted = embedded + failed;

        EngineStats {
            artists_indexed,
            cache_hit_rate,
            avg_score: if results == 0 {
                0.0
            } else {
                self.score_micros_total.load(Ordering::Relaxed) as f64
                    / 1_000_000.0
                    / results as f64
            },
            avg_latency_ms: if queries == 0 {
                0.0
            } else {
                self.latency_us_total.load(Ordering::Relaxed) as f64 / 1000.0 / queries as f64
            },
            processing_success_rate: if attempted == 0 {
                1.0
            } else {
                embedded as f64 / attempted as f64
            },
            uptime_s: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::models::AggregationStrategy;

    fn rec(score: f32) -> Recommendation {
        Recommendation {
            artist_id: 1,
            name: "a".to_string(),
            score,
            top_illustration_url: "http://x/a.png".to_string(),
            num_illustrations: 1,
            aggregation_strategy: AggregationStrategy::Max,
        }
    }

    #[test]
    fn fresh_metrics_report_neutral_values() {
        let metrics = EngineMetrics::new();
        let stats = metrics.snapshot(0, 0.0);
        assert_eq!(stats.avg_score, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert_eq!(stats.processing_success_rate, 1.0);
    }

    #[test]
    fn query_recording_feeds_averages() {
        let metrics = EngineMetrics::new();
        metrics.record_query(Duration::from_millis(10), &[rec(0.8), rec(0.4)]);
        metrics.record_query(Duration::from_millis(20), &[rec(0.6)]);

        let stats = metrics.snapshot(2, 0.5);
        assert!((stats.avg_latency_ms - 15.0).abs() < 0.5);
        assert!((stats.avg_score - 0.6).abs() < 1e-3);
        assert_eq!(stats.artists_indexed, 2);
        assert_eq!(stats.cache_hit_rate, 0.5);
    }

    #[test]
    fn ingest_counts_feed_success_rate() {
        let metrics = EngineMetrics::new();
        metrics.record_ingest(8, 2);
        let stats = metrics.snapshot(0, 0.0);
        assert!((stats.processing_success_rate - 0.8).abs() < 1e-9);
    }
}
