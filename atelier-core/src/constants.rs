/// Atelier system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dimensionality of the shared text-image embedding space.
pub const EMBEDDING_DIM: usize = 512;

/// Exact byte length of a persisted vector file (512 x f32 little-endian).
pub const VEC_FILE_LEN: usize = EMBEDDING_DIM * 4;

/// Tolerance for the unit-length invariant on embeddings.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// Largest response body the image fetcher will accept.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Encoder used when no model name is configured, or the configured one is unknown.
pub const DEFAULT_CLIP_MODEL: &str = "clip-ViT-B-32";

/// Encoder pairs the engine knows how to load. Both emit 512-dim vectors.
pub const KNOWN_CLIP_MODELS: &[&str] = &["clip-ViT-B-32", "clip-ViT-B-16"];

/// Version tag written into cache metadata documents.
pub const CACHE_METADATA_VERSION: &str = "1";
