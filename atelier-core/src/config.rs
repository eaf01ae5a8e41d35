//! Engine configuration, loaded from the environment.
//!
//! Every knob has a documented default and a clamp range. Unparsable values
//! fall back to the default; out-of-range values are clamped. Both cases are
//! logged at warning level.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::constants::{DEFAULT_CLIP_MODEL, DEFAULT_MAX_IMAGE_BYTES, KNOWN_CLIP_MODELS};
use crate::models::AggregationStrategy;

/// Configuration for the matching engine and its pipeline.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Max of width/height after the preprocessing resize, in pixels.
    pub max_image_size: u32,
    /// Number of images encoded per batch.
    pub image_batch_size: usize,
    /// Per-attempt HTTP deadline for image downloads.
    pub download_timeout: Duration,
    /// Size of the image download worker pool.
    pub download_workers: usize,
    /// Directory holding the persistent embedding cache.
    pub cache_dir: PathBuf,
    /// How per-illustration scores collapse into one artist score.
    pub strategy: AggregationStrategy,
    /// `k` for the `top_k_mean` strategy.
    pub top_k_illustrations: usize,
    /// Identifier of the CLIP encoder pair.
    pub model_name: String,
    /// Directory holding the ONNX model files and tokenizer.
    pub model_dir: PathBuf,
    /// Largest response body accepted by the fetcher.
    pub max_image_bytes: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_image_size: 512,
            image_batch_size: 32,
            download_timeout: Duration::from_secs(10),
            download_workers: 10,
            cache_dir: PathBuf::from("./cache/embeddings"),
            strategy: AggregationStrategy::Max,
            top_k_illustrations: 3,
            model_name: DEFAULT_CLIP_MODEL.to_string(),
            model_dir: PathBuf::from("./models").join(DEFAULT_CLIP_MODEL),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl MatchConfig {
    /// Load configuration from the environment, clamping every numeric knob.
    ///
    /// The model name is resolved against the known set here, before the
    /// default `model_dir` is derived from it, so an unknown name falls all
    /// the way back to the default model's directory.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let model_name = resolved_model_name("CLIP_MODEL_NAME");
        let model_dir = env::var("CLIP_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./models").join(&model_name));

        Self {
            max_image_size: clamped_u64("MAX_IMAGE_SIZE", 512, 1, 2048) as u32,
            image_batch_size: clamped_u64("IMAGE_BATCH_SIZE", 32, 1, 128) as usize,
            download_timeout: Duration::from_secs(clamped_u64("IMAGE_DOWNLOAD_TIMEOUT", 10, 1, 60)),
            download_workers: clamped_u64("IMAGE_DOWNLOAD_WORKERS", 10, 1, 50) as usize,
            cache_dir: env::var("EMBEDDING_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            strategy: parsed_strategy("AGGREGATION_STRATEGY"),
            top_k_illustrations: clamped_u64("TOP_K_ILLUSTRATIONS", 3, 1, 20) as usize,
            model_name,
            model_dir,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Read an integer env var, falling back to `default` when unset or
/// unparsable and clamping into `[min, max]`.
fn clamped_u64(key: &str, default: u64, min: u64, max: u64) -> u64 {
    let raw = match env::var(key) {
        Ok(v) => v,
        Err(_) => return default,
    };

    let parsed = match raw.trim().parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            warn!(key, value = %raw, default, "unparsable config value, using default");
            return default;
        }
    };

    if parsed < min || parsed > max {
        let clamped = parsed.clamp(min, max);
        warn!(key, value = parsed, clamped, "config value out of range, clamping");
        clamped
    } else {
        parsed
    }
}

/// Read the model name env var, falling back to the default for names
/// outside the known set.
fn resolved_model_name(key: &str) -> String {
    let raw = match env::var(key) {
        Ok(v) => v,
        Err(_) => return DEFAULT_CLIP_MODEL.to_string(),
    };

    let trimmed = raw.trim();
    if KNOWN_CLIP_MODELS.contains(&trimmed) {
        trimmed.to_string()
    } else {
        warn!(key, value = %raw, fallback = DEFAULT_CLIP_MODEL, "unknown CLIP model, using default");
        DEFAULT_CLIP_MODEL.to_string()
    }
}

/// Read the aggregation strategy env var, falling back to the default on
/// unknown names.
fn parsed_strategy(key: &str) -> AggregationStrategy {
    let raw = match env::var(key) {
        Ok(v) => v,
        Err(_) => return AggregationStrategy::default(),
    };

    match raw.trim().parse::<AggregationStrategy>() {
        Ok(s) => s,
        Err(_) => {
            warn!(key, value = %raw, "unknown aggregation strategy, using default");
            AggregationStrategy::default()
        }
    }
}
