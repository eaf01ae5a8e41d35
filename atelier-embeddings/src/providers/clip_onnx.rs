//! ONNX Runtime CLIP encoder pair.
//!
//! Loads the visual and textual towers as separate `ort` sessions from a
//! model directory (`visual.onnx`, `textual.onnx`, `tokenizer.json`). Both
//! towers emit 512-dim vectors that are L2-normalized before leaving this
//! module.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

use atelier_core::constants::EMBEDDING_DIM;
use atelier_core::errors::{AtelierResult, EncodeError};
use atelier_core::models::Embedding;
use atelier_core::traits::IClipEncoder;

use crate::preprocess::{clip_pixels, CLIP_INPUT_SIZE};

/// Token sequence length of the CLIP text tower.
const CLIP_CONTEXT_LENGTH: usize = 77;

/// CLIP encoder backed by ONNX Runtime.
///
/// Sessions require `&mut self` for `run`, so each tower sits behind its own
/// `Mutex`. All encode calls are expected to arrive through a single task;
/// the locks are a safety net, not a throughput device.
pub struct ClipOnnxEncoder {
    visual: Mutex<Session>,
    textual: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
}

impl ClipOnnxEncoder {
    /// Load both towers and the tokenizer from `model_dir`.
    ///
    /// # Errors
    /// Returns `EncodeError::ModelLoad` when any of the three files is
    /// missing or unloadable.
    pub fn load(model_dir: &Path, model_name: &str) -> AtelierResult<Self> {
        let visual = load_session(&model_dir.join("visual.onnx"), model_name)?;
        let textual = load_session(&model_dir.join("textual.onnx"), model_name)?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            EncodeError::ModelLoad {
                name: model_name.to_string(),
                reason: format!("tokenizer {}: {err}", tokenizer_path.display()),
            }
        })?;

        debug!(model = model_name, dir = %model_dir.display(), "CLIP sessions loaded");

        Ok(Self {
            visual: Mutex::new(visual),
            textual: Mutex::new(textual),
            tokenizer,
            model_name: model_name.to_string(),
        })
    }

    /// Tokenize to exactly `CLIP_CONTEXT_LENGTH` ids, truncating or
    /// zero-padding as needed.
    fn token_ids(&self, text: &str) -> Result<Vec<i64>, EncodeError> {
        let encoding = self.tokenizer.encode(text, true).map_err(|err| {
            EncodeError::Tokenize { reason: err.to_string() }
        })?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        ids.truncate(CLIP_CONTEXT_LENGTH);
        ids.resize(CLIP_CONTEXT_LENGTH, 0);
        Ok(ids)
    }
}

fn load_session(path: &Path, model_name: &str) -> Result<Session, EncodeError> {
    let model_load = |reason: String| EncodeError::ModelLoad {
        name: model_name.to_string(),
        reason,
    };

    if !path.exists() {
        return Err(model_load(format!("{} not found", path.display())));
    }

    Session::builder()
        .map_err(|e| model_load(e.to_string()))?
        .with_intra_threads(2)
        .map_err(|e| model_load(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| model_load(e.to_string()))
}

/// Split a `[batch, 512]` output buffer into normalized rows.
fn normalize_rows(
    shape: &[i64],
    data: &[f32],
    expected_batch: usize,
) -> Result<Vec<Embedding>, EncodeError> {
    if shape.len() != 2 || shape[0] as usize != expected_batch {
        return Err(EncodeError::Inference {
            reason: format!("unexpected output shape: {shape:?}"),
        });
    }
    let dims = shape[1] as usize;
    if dims != EMBEDDING_DIM {
        return Err(EncodeError::BadDimensions {
            expected: EMBEDDING_DIM,
            got: dims,
        });
    }

    (0..expected_batch)
        .map(|row| Embedding::normalized(data[row * dims..(row + 1) * dims].to_vec()))
        .collect()
}

impl IClipEncoder for ClipOnnxEncoder {
    fn encode_images(&self, images: &[RgbImage]) -> AtelierResult<Vec<Embedding>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let plane = (CLIP_INPUT_SIZE * CLIP_INPUT_SIZE) as usize * 3;
        let mut data = Vec::with_capacity(images.len() * plane);
        for image in images {
            data.extend(clip_pixels(image));
        }

        let tensor = Tensor::from_array((
            vec![
                images.len() as i64,
                3,
                CLIP_INPUT_SIZE as i64,
                CLIP_INPUT_SIZE as i64,
            ],
            data,
        ))
        .map_err(|e| EncodeError::Inference {
            reason: format!("tensor creation error: {e}"),
        })?;

        let mut session = self.visual.lock().map_err(|e| EncodeError::Inference {
            reason: format!("visual session lock poisoned: {e}"),
        })?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| EncodeError::Inference { reason: e.to_string() })?;

        let (_name, output) = outputs.iter().next().ok_or_else(|| EncodeError::Inference {
            reason: "no output tensor".to_string(),
        })?;
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|err| {
            EncodeError::Inference {
                reason: format!("tensor extraction failed: {err}"),
            }
        })?;

        let shape: Vec<i64> = shape.to_vec();
        Ok(normalize_rows(&shape, data, images.len())?)
    }

    fn encode_text(&self, text: &str) -> AtelierResult<Embedding> {
        let ids = self.token_ids(text)?;
        let tensor = Tensor::from_array((vec![1i64, CLIP_CONTEXT_LENGTH as i64], ids)).map_err(
            |e| EncodeError::Inference {
                reason: format!("tensor creation error: {e}"),
            },
        )?;

        let mut session = self.textual.lock().map_err(|e| EncodeError::Inference {
            reason: format!("textual session lock poisoned: {e}"),
        })?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| EncodeError::Inference { reason: e.to_string() })?;

        let (_name, output) = outputs.iter().next().ok_or_else(|| EncodeError::Inference {
            reason: "no output tensor".to_string(),
        })?;
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|err| {
            EncodeError::Inference {
                reason: format!("tensor extraction failed: {err}"),
            }
        })?;

        let shape: Vec<i64> = shape.to_vec();
        let mut rows = normalize_rows(&shape, data, 1)?;
        Ok(rows.remove(0))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_available(&self) -> bool {
        true
    }
}
