//! The `metadata.json` index document and atomic file writes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use atelier_core::constants::CACHE_METADATA_VERSION;
use atelier_core::errors::CacheError;

pub(crate) const METADATA_FILE: &str = "metadata.json";

/// On-disk index: maps hex hash to the entry that owns `<hash>.vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetadataFile {
    pub version: String,
    pub model_name: String,
    pub embeddings: HashMap<String, MetadataEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetadataEntry {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
}

impl MetadataFile {
    pub(crate) fn empty(model_name: &str) -> Self {
        Self {
            version: CACHE_METADATA_VERSION.to_string(),
            model_name: model_name.to_string(),
            embeddings: HashMap::new(),
        }
    }

    /// Load the index from `dir`, or `None` when it is missing or
    /// unreadable. Unreadable metadata is logged and treated as empty so a
    /// damaged index never blocks startup.
    pub(crate) fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(METADATA_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    error!(path = %path.display(), error = %err, "cache metadata unreadable, rebuilding empty");
                }
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                error!(path = %path.display(), error = %err, "cache metadata corrupt, rebuilding empty");
                None
            }
        }
    }

    /// Persist the index with the tmp+fsync+rename pattern.
    pub(crate) fn persist(&self, dir: &Path) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|err| CacheError::CorruptEntry {
            hash: String::new(),
            reason: format!("metadata serialization failed: {err}"),
        })?;
        write_atomic(dir, METADATA_FILE, &bytes)
    }
}

/// Write `bytes` to `dir/name` atomically: write a sibling `.tmp`, fsync,
/// rename over the final name.
pub(crate) fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), CacheError> {
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!("{name}.tmp"));

    let io_err = |path: &Path, source: std::io::Error| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
    file.write_all(bytes).map_err(|e| io_err(&tmp_path, e))?;
    file.sync_all().map_err(|e| io_err(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, &final_path).map_err(|e| io_err(&final_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = MetadataFile::empty("clip-ViT-B-32");
        meta.embeddings.insert(
            "abc123".to_string(),
            MetadataEntry {
                url: "http://example.com/a.png".to_string(),
                created_at: Utc::now(),
                file_path: "abc123.vec".to_string(),
            },
        );
        meta.persist(dir.path()).unwrap();

        let loaded = MetadataFile::load(dir.path()).unwrap();
        assert_eq!(loaded.version, CACHE_METADATA_VERSION);
        assert_eq!(loaded.model_name, "clip-ViT-B-32");
        assert_eq!(loaded.embeddings.len(), 1);
        assert_eq!(loaded.embeddings["abc123"].file_path, "abc123.vec");
    }

    #[test]
    fn missing_metadata_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MetadataFile::load(dir.path()).is_none());
    }

    #[test]
    fn corrupt_metadata_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), b"{ not json").unwrap();
        assert!(MetadataFile::load(dir.path()).is_none());
    }

    #[test]
    fn write_atomic_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(dir.path(), "out.bin", b"payload").unwrap();
        assert_eq!(fs::read(dir.path().join("out.bin")).unwrap(), b"payload");
        assert!(!dir.path().join("out.bin.tmp").exists());
    }
}
