use std::time::Duration;

/// What went wrong while fetching one image URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("invalid URL")]
    InvalidUrl,

    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("undecodable image data")]
    InvalidImage,

    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// A per-URL fetch failure. Records the URL, the failure kind, and the
/// elapsed time across all attempts.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} fetching {url} after {elapsed_ms}ms")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub elapsed_ms: u64,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FetchErrorKind, elapsed: Duration) -> Self {
        Self {
            url: url.into(),
            kind,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transient: transport errors, timeouts, 5xx, and 408/429.
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::Network(_) => true,
            FetchErrorKind::Http(status) => {
                (500..=599).contains(status) || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = FetchError::new("http://x/a.png", FetchErrorKind::Http(503), Duration::ZERO);
        assert!(err.is_transient());
    }

    #[test]
    fn throttling_statuses_are_transient() {
        for status in [408, 429] {
            let err =
                FetchError::new("http://x/a.png", FetchErrorKind::Http(status), Duration::ZERO);
            assert!(err.is_transient(), "status {status} should retry");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 403, 404, 410] {
            let err =
                FetchError::new("http://x/a.png", FetchErrorKind::Http(status), Duration::ZERO);
            assert!(!err.is_transient(), "status {status} should not retry");
        }
    }

    #[test]
    fn decode_failures_are_permanent() {
        let err = FetchError::new("http://x/a.png", FetchErrorKind::InvalidImage, Duration::ZERO);
        assert!(!err.is_transient());
    }
}
