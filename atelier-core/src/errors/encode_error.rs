/// Failures from the CLIP encoders.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to load model {name}: {reason}")]
    ModelLoad { name: String, reason: String },

    #[error("tokenization failed: {reason}")]
    Tokenize { reason: String },

    #[error("inference failed: {reason}")]
    Inference { reason: String },

    #[error("expected {expected}-dim embedding, got {got}")]
    BadDimensions { expected: usize, got: usize },

    #[error("embedding norm {norm} outside unit tolerance")]
    NotUnitLength { norm: f32 },

    #[error("cannot normalize a zero vector")]
    ZeroNorm,
}
