use image::RgbImage;

use crate::errors::AtelierResult;
use crate::models::Embedding;

/// A paired image/text encoder into the shared 512-dim space.
///
/// Implementations must be deterministic for a given model and input bytes;
/// the persistent cache relies on this for validity across restarts.
pub trait IClipEncoder: Send + Sync {
    /// Encode a batch of decoded images, preserving input order.
    fn encode_images(&self, images: &[RgbImage]) -> AtelierResult<Vec<Embedding>>;

    /// Encode a query text into the same space.
    fn encode_text(&self, text: &str) -> AtelierResult<Embedding>;

    /// Identifier of the underlying model; recorded in cache metadata.
    fn model_name(&self) -> &str;

    /// Whether this encoder is currently usable.
    fn is_available(&self) -> bool;
}
