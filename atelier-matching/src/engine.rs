//! The matching engine.
//!
//! Owns the artist index, the ingestion pipeline, and the query path.
//! Initialization and reload rebuild the index from upstream artist records;
//! `recommend` scores a brief against the current snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use atelier_cache::EmbeddingCache;
use atelier_core::config::MatchConfig;
use atelier_core::errors::{AtelierResult, QueryError};
use atelier_core::models::{
    AggregationStrategy, ArtistProfile, CacheStats, Embedding, EngineStats, IngestReport,
    Recommendation,
};
use atelier_core::traits::IClipEncoder;
use atelier_embeddings::{build_encoder, QueryEmbeddingMemo};
use atelier_fetch::ImageFetcher;

use crate::aggregate::aggregate;
use crate::cancel::CancelFlag;
use crate::index::{ArtistIndex, IndexCell, IndexedArtist, LifecycleState};
use crate::ingest::{self, PipelineParams};
use crate::metrics::EngineMetrics;

/// Embedding-backed portfolio matcher.
pub struct MatchingEngine {
    config: MatchConfig,
    fetcher: Arc<ImageFetcher>,
    encoder: Arc<dyn IClipEncoder>,
    cache: Arc<EmbeddingCache>,
    memo: QueryEmbeddingMemo,
    index: IndexCell,
    metrics: EngineMetrics,
}

impl MatchingEngine {
    /// Build an engine from configuration: encoder, cache bound to the
    /// encoder's model, shared HTTP client.
    ///
    /// # Errors
    /// Fails when the configured CLIP model cannot be loaded, or when the
    /// cache directory is unusable or locked. All three are fatal; the
    /// engine never starts on a substitute encoder or a partial cache.
    pub fn new(config: MatchConfig) -> AtelierResult<Self> {
        let encoder = build_encoder(&config)?;
        let cache = EmbeddingCache::open(&config.cache_dir, encoder.model_name())?;
        let fetcher = ImageFetcher::new(&config);
        Ok(Self::with_parts(config, fetcher, encoder, cache))
    }

    /// Assemble an engine from explicit parts. The seam tests use to swap
    /// in a deterministic encoder or a fast-retry fetcher.
    pub fn with_parts(
        config: MatchConfig,
        fetcher: ImageFetcher,
        encoder: Arc<dyn IClipEncoder>,
        cache: EmbeddingCache,
    ) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
            encoder,
            cache: Arc::new(cache),
            memo: QueryEmbeddingMemo::default(),
            index: IndexCell::new(),
            metrics: EngineMetrics::new(),
        }
    }

    /// Ingest artist records and publish a fresh index.
    pub async fn ingest(&self, artists: Vec<ArtistProfile>) -> AtelierResult<IngestReport> {
        self.ingest_with_cancel(artists, CancelFlag::new()).await
    }

    /// Ingest with a cancellation signal. On cancel no index is published;
    /// cache entries persisted before the cancel stay valid.
    pub async fn ingest_with_cancel(
        &self,
        artists: Vec<ArtistProfile>,
        cancel: CancelFlag,
    ) -> AtelierResult<IngestReport> {
        self.index.begin_load();

        // Unique URLs across all artists, first-seen order.
        let mut unique: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for artist in &artists {
            for url in &artist.image_urls {
                if seen.insert(url.as_str()) {
                    unique.push(url.clone());
                }
            }
        }

        // Probe the cache; only misses enter the pipeline.
        let mut resolved: HashMap<String, Embedding> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        for url in unique {
            match self.cache.get(&url) {
                Some(embedding) => {
                    resolved.insert(url, embedding);
                }
                None => missing.push(url),
            }
        }
        let cache_hits = resolved.len() as u64;
        let cache_misses = missing.len() as u64;

        let outcome = ingest::embed_missing(
            missing,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.encoder),
            Arc::clone(&self.cache),
            PipelineParams {
                max_image_size: self.config.max_image_size,
                batch_size: self.config.image_batch_size,
                workers: self.config.download_workers,
            },
            cancel,
        )
        .await;

        let images_embedded = outcome.embedded.len();
        let images_failed = outcome.failed.len();
        resolved.extend(outcome.embedded);

        if outcome.cancelled {
            self.index.abort_load();
            info!(images_embedded, "ingestion cancelled before publish");
            return Ok(IngestReport {
                artists_indexed: 0,
                artists_excluded: 0,
                images_embedded,
                images_failed,
                cache_hits,
                cache_misses,
                cancelled: true,
            });
        }

        // Reattach embeddings per artist in URL order; artists reduced to
        // zero usable illustrations are excluded from the index.
        let mut indexed: Vec<IndexedArtist> = Vec::with_capacity(artists.len());
        let mut excluded = 0usize;
        for artist in artists {
            let mut embeddings: Vec<(String, Embedding)> = Vec::new();
            let mut failed_urls: HashSet<String> = HashSet::new();
            let mut artist_seen: HashSet<&str> = HashSet::new();

            for url in &artist.image_urls {
                if !artist_seen.insert(url.as_str()) {
                    continue;
                }
                match resolved.get(url) {
                    Some(embedding) => embeddings.push((url.clone(), embedding.clone())),
                    None => {
                        failed_urls.insert(url.clone());
                    }
                }
            }

            if embeddings.is_empty() {
                warn!(
                    artist_id = artist.id,
                    name = %artist.name,
                    urls = artist.image_urls.len(),
                    "excluding artist with no usable illustrations"
                );
                excluded += 1;
                continue;
            }

            indexed.push(IndexedArtist {
                id: artist.id,
                name: artist.name,
                image_urls: artist.image_urls,
                embeddings,
                failed_urls,
            });
        }

        let artists_indexed = indexed.len();
        self.index.publish(ArtistIndex {
            artists: indexed,
            built_at: Utc::now(),
        });
        self.metrics
            .record_ingest(images_embedded as u64, images_failed as u64);

        info!(
            artists_indexed,
            artists_excluded = excluded,
            images_embedded,
            images_failed,
            cache_hits,
            "artist index published"
        );

        Ok(IngestReport {
            artists_indexed,
            artists_excluded: excluded,
            images_embedded,
            images_failed,
            cache_hits,
            cache_misses,
            cancelled: false,
        })
    }

    /// Rebuild the index from a fresh artist list. The previous snapshot
    /// keeps serving queries until the replacement is published.
    pub async fn reload(&self, artists: Vec<ArtistProfile>) -> AtelierResult<IngestReport> {
        self.ingest(artists).await
    }

    /// Rank indexed artists against a brief and return the top `k`.
    ///
    /// Fails fast with `QueryError::NotReady` only during the initial load;
    /// an engine that has never loaded, or whose index ended up empty,
    /// returns an empty list.
    pub fn recommend(&self, brief_text: &str, k: usize) -> AtelierResult<Vec<Recommendation>> {
        let started = Instant::now();

        let index = match self.index.read() {
            (LifecycleState::Loading, None) => return Err(QueryError::NotReady.into()),
            (_, Some(index)) => index,
            (_, None) => return Ok(Vec::new()),
        };
        if index.artists.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.memo.get_or_encode(&*self.encoder, brief_text)?;
        let results = rank(
            &index,
            &query,
            self.config.strategy,
            self.config.top_k_illustrations,
            k,
        );

        self.metrics.record_query(started.elapsed(), &results);
        Ok(results)
    }

    /// Facade-facing statistics.
    pub fn stats(&self) -> EngineStats {
        let artists_indexed = self
            .index
            .read()
            .1
            .map(|index| index.artists.len())
            .unwrap_or(0);
        self.metrics
            .snapshot(artists_indexed, self.cache.stats().hit_rate)
    }

    /// Counters from the embedding cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The persistent embedding cache backing this engine.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

/// Score every artist and produce the top `k`, ties broken by ascending id.
pub(crate) fn rank(
    index: &ArtistIndex,
    query: &Embedding,
    strategy: AggregationStrategy,
    top_k_illustrations: usize,
    k: usize,
) -> Vec<Recommendation> {
    let mut results: Vec<Recommendation> = index
        .artists
        .par_iter()
        .map(|artist| score_artist(artist, query, strategy, top_k_illustrations))
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.artist_id.cmp(&b.artist_id))
    });
    results.truncate(k);
    results
}

/// Score one artist: per-illustration cosine mapped to [0, 1], aggregated
/// under the strategy. `top_illustration_url` is the argmax regardless of
/// strategy (first wins on exact ties).
fn score_artist(
    artist: &IndexedArtist,
    query: &Embedding,
    strategy: AggregationStrategy,
    top_k_illustrations: usize,
) -> Recommendation {
    let scores: Vec<f32> = artist
        .embeddings
        .iter()
        .map(|(_, embedding)| ((query.dot(embedding) + 1.0) / 2.0).clamp(0.0, 1.0))
        .collect();

    let mut best = 0usize;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }

    Recommendation {
        artist_id: artist.id,
        name: artist.name.clone(),
        score: aggregate(strategy, &scores, top_k_illustrations).clamp(0.0, 1.0),
        top_illustration_url: artist.embeddings[best].0.clone(),
        num_illustrations: scores.len(),
        aggregation_strategy: strategy,
    }
}
