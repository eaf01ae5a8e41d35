//! Deterministic fixtures for cross-crate integration tests.
//!
//! `StubEncoder` replaces the CLIP pair with a programmable map from known
//! inputs to known unit vectors: solid-color images key on their top-left
//! pixel, texts on their exact content. Unknown inputs hash to a stable
//! axis vector so warm-cache runs stay deterministic without programming.

use std::collections::HashMap;

use image::{ImageFormat, Rgb, RgbImage};

use atelier_core::constants::EMBEDDING_DIM;
use atelier_core::errors::AtelierResult;
use atelier_core::models::Embedding;
use atelier_core::traits::IClipEncoder;

/// Model name the stub reports; cache metadata binds to it.
pub const STUB_MODEL: &str = "stub-clip-512";

/// Install a test tracing subscriber honoring `RUST_LOG`. Idempotent.
pub fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Unit vector along one axis.
pub fn unit_axis(axis: usize) -> Embedding {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[axis % EMBEDDING_DIM] = 1.0;
    Embedding::new(v).unwrap()
}

/// Unit vector with a chosen cosine against `unit_axis(0)`.
///
/// Scores derive as `(cos + 1) / 2`, so a fixture wanting score `s` passes
/// `cosine = 2s - 1`.
pub fn vector_with_cosine(cosine: f32) -> Embedding {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = cosine;
    v[1] = (1.0 - cosine * cosine).max(0.0).sqrt();
    Embedding::normalized(v).unwrap()
}

/// A solid-color square raster.
pub fn solid_image(color: [u8; 3], size: u32) -> RgbImage {
    let mut img = RgbImage::new(size, size);
    for pixel in img.pixels_mut() {
        *pixel = Rgb(color);
    }
    img
}

/// Byte-exact PNG of a solid-color square, for HTTP fixtures.
pub fn png_bytes(color: [u8; 3], size: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    solid_image(color, size)
        .write_to(&mut out, ImageFormat::Png)
        .expect("png encode");
    out.into_inner()
}

/// Programmable deterministic encoder.
pub struct StubEncoder {
    colors: HashMap<[u8; 3], Embedding>,
    texts: HashMap<String, Embedding>,
}

impl StubEncoder {
    pub fn new() -> Self {
        Self {
            colors: HashMap::new(),
            texts: HashMap::new(),
        }
    }

    /// Map solid images of `color` to `embedding`.
    #[must_use]
    pub fn with_color(mut self, color: [u8; 3], embedding: Embedding) -> Self {
        self.colors.insert(color, embedding);
        self
    }

    /// Map exactly `text` to `embedding`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>, embedding: Embedding) -> Self {
        self.texts.insert(text.into(), embedding);
        self
    }

    fn fallback_axis(bytes: &[u8]) -> Embedding {
        let digest = blake3::hash(bytes);
        let axis = u64::from_le_bytes(digest.as_bytes()[..8].try_into().expect("digest slice"));
        unit_axis(axis as usize % EMBEDDING_DIM)
    }
}

impl Default for StubEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IClipEncoder for StubEncoder {
    fn encode_images(&self, images: &[RgbImage]) -> AtelierResult<Vec<Embedding>> {
        Ok(images
            .iter()
            .map(|image| {
                let key = image.get_pixel(0, 0).0;
                self.colors
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Self::fallback_axis(&key))
            })
            .collect())
    }

    fn encode_text(&self, text: &str) -> AtelierResult<Embedding> {
        Ok(self
            .texts
            .get(text)
            .cloned()
            .unwrap_or_else(|| Self::fallback_axis(text.as_bytes())))
    }

    fn model_name(&self) -> &str {
        STUB_MODEL
    }

    fn is_available(&self) -> bool {
        true
    }
}
