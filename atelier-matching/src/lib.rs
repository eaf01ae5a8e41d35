//! # atelier-matching
//!
//! The orchestrating engine: turns artist records into an immutable scored
//! index (fetch → encode → cache), serves ranked recommendations against
//! it, and owns the metrics the facade reports.

pub mod aggregate;
pub mod cancel;
pub mod engine;
pub mod index;
pub mod metrics;

mod ingest;

pub use aggregate::aggregate;
pub use cancel::CancelFlag;
pub use engine::MatchingEngine;
pub use index::{ArtistIndex, IndexedArtist, LifecycleState};
