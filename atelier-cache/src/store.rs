//! The embedding cache proper.
//!
//! In-memory index: an `Arc<HashMap>` snapshot swapped under a writer lock.
//! Readers clone the current snapshot and never block writers. On disk: one
//! `<hash>.vec` per entry plus the `metadata.json` index; a crash can never
//! leave a metadata entry without its file (or the reverse) surviving the
//! next startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use atelier_core::constants::VEC_FILE_LEN;
use atelier_core::errors::CacheError;
use atelier_core::models::{CacheStats, Embedding};

use crate::lock::CacheLock;
use crate::metadata::{write_atomic, MetadataEntry, MetadataFile, METADATA_FILE};

/// Stable content-independent cache key for a URL.
pub fn url_hash(url: &str) -> String {
    blake3::hash(url.as_bytes()).to_hex().to_string()
}

/// One cached embedding and the metadata that anchors it on disk.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
    pub embedding: Embedding,
}

type IndexSnapshot = Arc<HashMap<String, CacheEntry>>;

/// Durable URL→embedding map bound to one encoder model.
pub struct EmbeddingCache {
    dir: PathBuf,
    model_name: String,
    index: RwLock<IndexSnapshot>,
    writer: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    _lock: CacheLock,
}

impl EmbeddingCache {
    /// Open (or create) the cache at `dir` for the given encoder model.
    ///
    /// Runs startup recovery: entries whose vector file is missing, short,
    /// or denormalized are dropped; `.vec` files no metadata references are
    /// deleted. A metadata model name other than `model_name` shadows the
    /// whole cache as cold without touching the files, so reverting the
    /// model revives them.
    pub fn open(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Result<Self, CacheError> {
        let dir = dir.into();
        let model_name = model_name.into();

        fs::create_dir_all(&dir).map_err(|err| CacheError::DirUnusable {
            path: dir.clone(),
            reason: err.to_string(),
        })?;
        let lock = CacheLock::acquire(&dir)?;

        let metadata = MetadataFile::load(&dir);
        let index = match metadata {
            Some(meta) if meta.model_name == model_name => recover(&dir, meta),
            Some(meta) => {
                info!(
                    cached_model = %meta.model_name,
                    configured_model = %model_name,
                    "cache written by a different model, shadowing as cold"
                );
                HashMap::new()
            }
            None => HashMap::new(),
        };

        debug!(dir = %dir.display(), entries = index.len(), model = %model_name, "embedding cache opened");

        Ok(Self {
            dir,
            model_name,
            index: RwLock::new(Arc::new(index)),
            writer: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            _lock: lock,
        })
    }

    /// Look up a URL. O(1) against the in-memory snapshot; counts the
    /// hit/miss either way.
    pub fn get(&self, url: &str) -> Option<Embedding> {
        let snapshot = self.snapshot();
        match snapshot.get(&url_hash(url)) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.embedding.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Persist an embedding for a URL: vector file first, then index and
    /// metadata. Idempotent; last writer wins (values are equal under
    /// encoder determinism).
    pub fn set(&self, url: &str, embedding: &Embedding) -> Result<(), CacheError> {
        let guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let hash = url_hash(url);

        let current = self.snapshot();
        if let Some(existing) = current.get(&hash) {
            if existing.url != url {
                error!(
                    hash = %hash,
                    existing_url = %existing.url,
                    url,
                    "hash collision between distinct URLs, keeping first writer"
                );
                return Err(CacheError::HashCollision {
                    hash,
                    existing_url: existing.url.clone(),
                    url: url.to_string(),
                });
            }
        }

        let file_path = format!("{hash}.vec");
        write_atomic(&self.dir, &file_path, &embedding.to_le_bytes())?;

        let entry = CacheEntry {
            url: url.to_string(),
            created_at: Utc::now(),
            file_path,
            embedding: embedding.clone(),
        };

        let mut next = (*current).clone();
        next.insert(hash, entry);
        let next = Arc::new(next);
        self.publish(Arc::clone(&next));
        self.persist_metadata(&next)?;

        drop(guard);
        Ok(())
    }

    /// Remove a URL's entry and vector file. Safe when absent.
    pub fn invalidate(&self, url: &str) -> Result<(), CacheError> {
        let guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let hash = url_hash(url);

        let vec_path = self.dir.join(format!("{hash}.vec"));
        if let Err(err) = fs::remove_file(&vec_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                return Err(CacheError::Io { path: vec_path, source: err });
            }
        }

        let current = self.snapshot();
        if current.contains_key(&hash) {
            let mut next = (*current).clone();
            next.remove(&hash);
            let next = Arc::new(next);
            self.publish(Arc::clone(&next));
            self.persist_metadata(&next)?;
        }

        drop(guard);
        Ok(())
    }

    /// Entry count, disk footprint, and hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let metadata_bytes = fs::metadata(self.dir.join(METADATA_FILE))
            .map(|m| m.len())
            .unwrap_or(0);

        CacheStats {
            entries: snapshot.len(),
            disk_bytes: snapshot.len() as u64 * VEC_FILE_LEN as u64 + metadata_bytes,
            hits,
            misses,
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The model this cache is bound to.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn snapshot(&self) -> IndexSnapshot {
        Arc::clone(&self.index.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn publish(&self, next: IndexSnapshot) {
        *self.index.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    fn persist_metadata(&self, index: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let mut meta = MetadataFile::empty(&self.model_name);
        for (hash, entry) in index {
            meta.embeddings.insert(
                hash.clone(),
                MetadataEntry {
                    url: entry.url.clone(),
                    created_at: entry.created_at,
                    file_path: entry.file_path.clone(),
                },
            );
        }
        meta.persist(&self.dir)
    }
}

/// Cross-check metadata against the directory: load every referenced vector
/// file, drop entries that fail validation, delete orphaned `.vec` files.
fn recover(dir: &Path, meta: MetadataFile) -> HashMap<String, CacheEntry> {
    let mut index = HashMap::with_capacity(meta.embeddings.len());

    for (hash, entry) in meta.embeddings {
        let path = dir.join(&entry.file_path);
        match load_vector(&path) {
            Ok(embedding) => {
                index.insert(
                    hash,
                    CacheEntry {
                        url: entry.url,
                        created_at: entry.created_at,
                        file_path: entry.file_path,
                        embedding,
                    },
                );
            }
            Err(reason) => {
                error!(hash = %hash, url = %entry.url, %reason, "dropping corrupt cache entry");
                let _ = fs::remove_file(&path);
            }
        }
    }

    prune_orphans(dir, &index);
    index
}

fn load_vector(path: &Path) -> Result<Embedding, String> {
    let bytes = fs::read(path).map_err(|err| format!("vector file unreadable: {err}"))?;
    if bytes.len() != VEC_FILE_LEN {
        return Err(format!("vector file is {} bytes, expected {VEC_FILE_LEN}", bytes.len()));
    }
    Embedding::from_le_bytes(&bytes).map_err(|err| err.to_string())
}

/// Delete `.vec` files the index does not reference.
fn prune_orphans(dir: &Path, index: &HashMap<String, CacheEntry>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot scan cache directory for orphans");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".vec") {
            continue;
        }
        let hash = name.trim_end_matches(".vec");
        if !index.contains_key(hash) {
            warn!(file = name, "deleting orphaned vector file");
            let _ = fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::constants::EMBEDDING_DIM;

    fn axis_embedding(axis: usize) -> Embedding {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[axis] = 1.0;
        Embedding::new(v).unwrap()
    }

    #[test]
    fn url_hash_is_stable_hex() {
        let a = url_hash("http://example.com/a.png");
        let b = url_hash("http://example.com/a.png");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn set_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "clip-ViT-B-32").unwrap();
        let embedding = axis_embedding(7);

        cache.set("http://x/a.png", &embedding).unwrap();
        let got = cache.get("http://x/a.png").unwrap();
        assert_eq!(got, embedding);
    }

    #[test]
    fn miss_and_hit_counters_feed_hit_rate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "clip-ViT-B-32").unwrap();

        assert!(cache.get("http://x/missing.png").is_none());
        cache.set("http://x/a.png", &axis_embedding(0)).unwrap();
        assert!(cache.get("http://x/a.png").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn invalidate_removes_entry_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "clip-ViT-B-32").unwrap();

        cache.set("http://x/a.png", &axis_embedding(1)).unwrap();
        let hash = url_hash("http://x/a.png");
        assert!(dir.path().join(format!("{hash}.vec")).exists());

        cache.invalidate("http://x/a.png").unwrap();
        assert!(cache.get("http://x/a.png").is_none());
        assert!(!dir.path().join(format!("{hash}.vec")).exists());
    }

    #[test]
    fn invalidate_absent_url_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "clip-ViT-B-32").unwrap();
        cache.invalidate("http://x/never-set.png").unwrap();
    }

    #[test]
    fn set_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "clip-ViT-B-32").unwrap();
        let embedding = axis_embedding(2);

        cache.set("http://x/a.png", &embedding).unwrap();
        cache.set("http://x/a.png", &embedding).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("http://x/a.png").unwrap(), embedding);
    }
}
