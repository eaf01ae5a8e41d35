//! Three-stage ingestion pipeline: fetch pool → encoder task → cache writer.
//!
//! The stages are producer–consumer queues with explicit capacity, which
//! gives natural backpressure: fetch workers stall when the encoder lags,
//! the encoder stalls when the writer lags. The encoder is a single task
//! because the model is the expensive resource.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbImage;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use atelier_cache::EmbeddingCache;
use atelier_core::models::Embedding;
use atelier_core::traits::IClipEncoder;
use atelier_embeddings::preprocess;
use atelier_fetch::ImageFetcher;

use crate::cancel::CancelFlag;

/// What one pipeline run produced.
pub(crate) struct PipelineOutcome {
    /// URL → embedding for every image that made it through encoding. Cache
    /// write failures degrade to memory-only and still appear here.
    pub embedded: HashMap<String, Embedding>,
    /// URL → reason for every image that did not.
    pub failed: HashMap<String, String>,
    pub cancelled: bool,
}

pub(crate) struct PipelineParams {
    pub max_image_size: u32,
    pub batch_size: usize,
    pub workers: usize,
}

/// Fetch, encode, and persist embeddings for the given cache-missing URLs.
pub(crate) async fn embed_missing(
    urls: Vec<String>,
    fetcher: Arc<ImageFetcher>,
    encoder: Arc<dyn IClipEncoder>,
    cache: Arc<EmbeddingCache>,
    params: PipelineParams,
    cancel: CancelFlag,
) -> PipelineOutcome {
    if urls.is_empty() {
        return PipelineOutcome {
            embedded: HashMap::new(),
            failed: HashMap::new(),
            cancelled: cancel.is_cancelled(),
        };
    }

    let batch_size = params.batch_size.max(1);
    let queue_cap = batch_size * 2;
    let (img_tx, img_rx) = mpsc::channel::<(String, RgbImage)>(queue_cap);
    let (vec_tx, vec_rx) = mpsc::channel::<(String, Embedding)>(queue_cap);
    let (fail_tx, mut fail_rx) = mpsc::unbounded_channel::<(String, String)>();

    debug!(urls = urls.len(), workers = params.workers, batch_size, "ingestion pipeline started");

    let encode_cancel = cancel.clone();
    let encode_fail_tx = fail_tx.clone();
    let encode_handle = tokio::task::spawn_blocking(move || {
        encode_loop(img_rx, vec_tx, encode_fail_tx, encoder, batch_size, encode_cancel)
    });

    let writer_handle = tokio::task::spawn_blocking(move || write_loop(vec_rx, cache));

    let semaphore = Arc::new(Semaphore::new(params.workers.max(1)));
    let mut join_set = JoinSet::new();
    for url in urls {
        let semaphore = Arc::clone(&semaphore);
        let fetcher = Arc::clone(&fetcher);
        let img_tx = img_tx.clone();
        let fail_tx = fail_tx.clone();
        let cancel = cancel.clone();
        let max_side = params.max_image_size;

        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }
            match fetcher.fetch(&url).await {
                Ok(image) => {
                    let bounded = preprocess::bound_dimensions(image, max_side);
                    // Send fails only when the pipeline is shutting down.
                    let _ = img_tx.send((url, bounded)).await;
                }
                Err(err) => {
                    warn!(url = %err.url, error = %err, "image fetch failed");
                    let _ = fail_tx.send((err.url.clone(), err.to_string()));
                }
            }
        });
    }
    drop(img_tx);
    drop(fail_tx);

    while join_set.join_next().await.is_some() {}

    let encode_result = encode_handle.await;
    let embedded = writer_handle.await.unwrap_or_default();

    let mut failed = HashMap::new();
    while let Some((url, reason)) = fail_rx.recv().await {
        failed.insert(url, reason);
    }
    if let Err(err) = encode_result {
        warn!(error = %err, "encoder task aborted");
    }

    debug!(embedded = embedded.len(), failed = failed.len(), "ingestion pipeline finished");

    PipelineOutcome {
        embedded,
        failed,
        cancelled: cancel.is_cancelled(),
    }
}

/// Consume decoded images in batches; a partial final batch is flushed when
/// the channel closes. On cancel, queued items are dropped unencoded.
fn encode_loop(
    mut rx: mpsc::Receiver<(String, RgbImage)>,
    tx: mpsc::Sender<(String, Embedding)>,
    fail_tx: mpsc::UnboundedSender<(String, String)>,
    encoder: Arc<dyn IClipEncoder>,
    batch_size: usize,
    cancel: CancelFlag,
) {
    loop {
        let mut batch: Vec<(String, RgbImage)> = Vec::with_capacity(batch_size);
        let mut closed = false;
        while batch.len() < batch_size {
            match rx.blocking_recv() {
                Some(item) => batch.push(item),
                None => {
                    closed = true;
                    break;
                }
            }
        }

        if !batch.is_empty() && !cancel.is_cancelled() {
            let (urls, images): (Vec<String>, Vec<RgbImage>) = batch.into_iter().unzip();
            match encoder.encode_images(&images) {
                Ok(embeddings) => {
                    for (url, embedding) in urls.into_iter().zip(embeddings) {
                        if tx.blocking_send((url, embedding)).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(batch = urls.len(), error = %err, "batch encode failed, marking all items failed");
                    for url in urls {
                        let _ = fail_tx.send((url, format!("encode failure: {err}")));
                    }
                }
            }
        }

        if closed {
            break;
        }
    }
}

/// Persist each embedding as it arrives. A write failure degrades that URL
/// to memory-only operation; the embedding still reaches the index.
fn write_loop(
    mut rx: mpsc::Receiver<(String, Embedding)>,
    cache: Arc<EmbeddingCache>,
) -> HashMap<String, Embedding> {
    let mut embedded = HashMap::new();
    while let Some((url, embedding)) = rx.blocking_recv() {
        if let Err(err) = cache.set(&url, &embedding) {
            warn!(url, error = %err, "cache write failed, keeping embedding in memory only");
        }
        embedded.insert(url, embedding);
    }
    embedded
}
