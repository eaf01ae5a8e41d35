//! Encoder implementations.

mod clip_onnx;

use std::sync::Arc;

use tracing::info;

use atelier_core::config::MatchConfig;
use atelier_core::errors::AtelierResult;
use atelier_core::traits::IClipEncoder;

pub use clip_onnx::ClipOnnxEncoder;

/// Build the configured encoder.
///
/// An unloadable model is fatal: the engine never substitutes a different
/// encoder for the one the configuration and the cache are bound to.
///
/// # Errors
/// Returns `EncodeError::ModelLoad` when the model files or tokenizer
/// cannot be loaded from `config.model_dir`.
pub fn build_encoder(config: &MatchConfig) -> AtelierResult<Arc<dyn IClipEncoder>> {
    let encoder = ClipOnnxEncoder::load(&config.model_dir, &config.model_name)?;
    info!(
        model = %config.model_name,
        dir = %config.model_dir.display(),
        "CLIP encoder loaded"
    );
    Ok(Arc::new(encoder))
}
