//! # atelier-core
//!
//! Foundation crate for the atelier portfolio matching engine.
//! Defines all shared types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::MatchConfig;
pub use errors::{AtelierError, AtelierResult};
pub use models::{
    AggregationStrategy, ArtistProfile, Brief, CacheStats, Embedding, EngineStats, IngestReport,
    Recommendation,
};
pub use traits::IClipEncoder;
