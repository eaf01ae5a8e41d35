use std::path::PathBuf;

/// Failures from the persistent embedding cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry {hash}: {reason}")]
    CorruptEntry { hash: String, reason: String },

    #[error("cache directory {path} is unusable: {reason}")]
    DirUnusable { path: PathBuf, reason: String },

    #[error("cache directory {path} is locked by another process")]
    Locked { path: PathBuf },

    #[error("hash collision: {hash} maps to both {existing_url} and {url}")]
    HashCollision {
        hash: String,
        existing_url: String,
        url: String,
    },
}
