//! Error types, one file per failure domain.

mod cache_error;
mod encode_error;
mod fetch_error;
mod query_error;

pub use cache_error::CacheError;
pub use encode_error::EncodeError;
pub use fetch_error::{FetchError, FetchErrorKind};
pub use query_error::QueryError;

/// Unified error type for the whole workspace.
#[derive(Debug, thiserror::Error)]
pub enum AtelierError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result alias used across the workspace.
pub type AtelierResult<T> = Result<T, AtelierError>;
