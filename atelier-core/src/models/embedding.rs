//! The unit-length 512-dim f32 vector at the center of the system.
//!
//! Constructed only from encoder output or a validated cache load, and
//! immutable afterwards. Both towers of the CLIP pair emit vectors in the
//! same space, so cosine similarity reduces to a dot product.

use crate::constants::{EMBEDDING_DIM, UNIT_NORM_TOLERANCE, VEC_FILE_LEN};
use crate::errors::EncodeError;

/// An immutable, L2-normalized embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap an already-normalized vector, validating shape and norm.
    pub fn new(values: Vec<f32>) -> Result<Self, EncodeError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EncodeError::BadDimensions {
                expected: EMBEDDING_DIM,
                got: values.len(),
            });
        }
        let norm = l2_norm(&values);
        if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
            return Err(EncodeError::NotUnitLength { norm });
        }
        Ok(Self(values))
    }

    /// Normalize an arbitrary vector of the right shape.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, EncodeError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EncodeError::BadDimensions {
                expected: EMBEDDING_DIM,
                got: values.len(),
            });
        }
        let norm = l2_norm(&values);
        if norm <= f32::EPSILON {
            return Err(EncodeError::ZeroNorm);
        }
        for v in &mut values {
            *v /= norm;
        }
        Ok(Self(values))
    }

    /// Dot product. Equals cosine similarity because both sides are unit-length.
    pub fn dot(&self, other: &Self) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Serialize as 2048 little-endian bytes for the on-disk vector file.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize from the on-disk vector file format, re-validating the
    /// shape and unit-norm invariants.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.len() != VEC_FILE_LEN {
            return Err(EncodeError::BadDimensions {
                expected: EMBEDDING_DIM,
                got: bytes.len() / 4,
            });
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(values)
    }
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}
