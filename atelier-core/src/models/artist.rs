use serde::{Deserialize, Serialize};

/// An artist record as supplied by the upstream portfolio catalog.
///
/// The upstream payload is loosely typed; the boundary keeps only the fields
/// the engine needs and drops the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistProfile {
    /// Stable identity from upstream.
    pub id: u64,
    /// Opaque display label.
    pub name: String,
    /// Ordered portfolio image URLs. Duplicates are preserved as-is, but an
    /// embedding is computed once per unique URL.
    pub image_urls: Vec<String>,
}

impl ArtistProfile {
    pub fn new(id: u64, name: impl Into<String>, image_urls: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image_urls,
        }
    }
}
