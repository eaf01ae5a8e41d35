//! # atelier-embeddings
//!
//! Everything between a decoded raster (or a brief) and a unit-length
//! 512-dim vector: the memory-guard resize, the CLIP ONNX encoder pair, and
//! a memo for query-text embeddings.

pub mod preprocess;
pub mod providers;
pub mod query_memo;

pub use providers::{build_encoder, ClipOnnxEncoder};
pub use query_memo::QueryEmbeddingMemo;
