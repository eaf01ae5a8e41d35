//! The queryable artist index and its lifecycle.
//!
//! The index is read-mostly with rare full rebuilds: an immutable snapshot
//! behind a lock-swapped `Arc`. Readers hold their snapshot for the length
//! of a query; a rebuild publishing underneath them is invisible.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use atelier_core::models::Embedding;

/// An artist admitted to the index. Always has at least one embedding.
#[derive(Debug, Clone)]
pub struct IndexedArtist {
    pub id: u64,
    pub name: String,
    pub image_urls: Vec<String>,
    /// Unique successfully-embedded URLs, in first-occurrence order.
    pub embeddings: Vec<(String, Embedding)>,
    /// URLs that were processed but failed.
    pub failed_urls: HashSet<String>,
}

/// One immutable build of the index.
#[derive(Debug, Clone)]
pub struct ArtistIndex {
    pub artists: Vec<IndexedArtist>,
    pub built_at: DateTime<Utc>,
}

/// Where the index is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No build has ever been attempted; queries return an empty list.
    Empty,
    /// A build is in flight. With no previous snapshot, queries fail fast
    /// with `NotReady`; with one, it keeps serving until replaced.
    Loading,
    /// The current snapshot is fully built.
    Ready,
}

struct CellInner {
    state: LifecycleState,
    snapshot: Option<Arc<ArtistIndex>>,
}

/// Holder for the current index snapshot plus lifecycle state.
pub struct IndexCell {
    inner: RwLock<CellInner>,
}

impl IndexCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CellInner {
                state: LifecycleState::Empty,
                snapshot: None,
            }),
        }
    }

    /// Current state and snapshot reference, read atomically together.
    pub fn read(&self) -> (LifecycleState, Option<Arc<ArtistIndex>>) {
        let inner = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        (inner.state, inner.snapshot.clone())
    }

    /// Mark a build as in flight. The previous snapshot, if any, stays
    /// visible to readers.
    pub fn begin_load(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.state = LifecycleState::Loading;
    }

    /// Replace the snapshot atomically and mark the index ready.
    pub fn publish(&self, index: ArtistIndex) {
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.snapshot = Some(Arc::new(index));
        inner.state = LifecycleState::Ready;
    }

    /// Roll back an aborted build: the prior snapshot (or emptiness)
    /// becomes authoritative again.
    pub fn abort_load(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.state = if inner.snapshot.is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Empty
        };
    }
}

impl Default for IndexCell {
    fn default() -> Self {
        Self::new()
    }
}
