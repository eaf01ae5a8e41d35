//! Memo for brief-text embeddings.
//!
//! Repeat queries skip the text tower entirely. Keys are content hashes of
//! the flattened brief text.

use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

use atelier_core::errors::AtelierResult;
use atelier_core::models::Embedding;
use atelier_core::traits::IClipEncoder;

/// Default memo capacity; query texts are small and repeat often.
const DEFAULT_MEMO_ENTRIES: u64 = 1024;

/// In-memory memo of query-text embeddings.
pub struct QueryEmbeddingMemo {
    cache: Cache<String, Embedding>,
}

impl QueryEmbeddingMemo {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(Duration::from_secs(3600))
            .build();
        Self { cache }
    }

    /// Return the memoized embedding for `text`, encoding on first sight.
    pub fn get_or_encode(
        &self,
        encoder: &dyn IClipEncoder,
        text: &str,
    ) -> AtelierResult<Embedding> {
        let key = blake3::hash(text.as_bytes()).to_hex().to_string();

        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "query embedding memo hit");
            return Ok(hit);
        }

        let embedding = encoder.encode_text(text)?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }
}

impl Default for QueryEmbeddingMemo {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_ENTRIES)
    }
}
