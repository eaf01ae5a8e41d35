//! # atelier-cache
//!
//! Durable URL→embedding map: a `metadata.json` index beside one raw
//! 2048-byte vector file per entry. All writes are tmp+fsync+rename; startup
//! cross-checks metadata against files and prunes either side. Single-node,
//! single-process (a lock file enforces exclusivity).

mod lock;
mod metadata;
mod store;

pub use store::{url_hash, CacheEntry, EmbeddingCache};
