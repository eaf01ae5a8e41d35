/// Failures visible to callers of `recommend`.
///
/// An empty index is NOT an error: queries against it return an empty
/// result list. Only the initial load window surfaces a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("artist index is still loading")]
    NotReady,
}
