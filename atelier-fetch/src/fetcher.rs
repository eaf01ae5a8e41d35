//! HTTP image fetcher.
//!
//! One GET per attempt with a hard deadline and a bounded body. Transient
//! failures (transport errors, timeouts, 5xx, 408/429) retry on the backoff
//! schedule; everything else fails immediately.

use std::time::{Duration, Instant};

use image::RgbImage;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use atelier_core::config::MatchConfig;
use atelier_core::errors::{FetchError, FetchErrorKind};

use crate::retry::RetryPolicy;

/// Stateless image fetcher over a shared keep-alive client.
pub struct ImageFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
    retry: RetryPolicy,
}

impl ImageFetcher {
    /// Build a fetcher from engine configuration.
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            client: Client::new(),
            timeout: config.download_timeout,
            max_bytes: config.max_image_bytes,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the backoff schedule. Tests use `RetryPolicy::none()` or
    /// millisecond delays to keep timeout scenarios fast.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch and decode one image URL.
    ///
    /// Returns the decoded RGB raster, or a `FetchError` recording the URL,
    /// the failure kind, and the elapsed time across all attempts.
    pub async fn fetch(&self, url: &str) -> Result<RgbImage, FetchError> {
        let started = Instant::now();

        let parsed = Url::parse(url).map_err(|_| {
            FetchError::new(url, FetchErrorKind::InvalidUrl, started.elapsed())
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::new(url, FetchErrorKind::InvalidUrl, started.elapsed()));
        }

        let mut attempt = 0;
        loop {
            match self.attempt(parsed.clone()).await {
                Ok(bytes) => {
                    let decoded = image::load_from_memory(&bytes).map_err(|err| {
                        debug!(url, error = %err, "image decode failed");
                        FetchError::new(url, FetchErrorKind::InvalidImage, started.elapsed())
                    })?;
                    debug!(
                        url,
                        bytes = bytes.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "image fetched"
                    );
                    return Ok(decoded.to_rgb8());
                }
                Err(kind) => {
                    let error = FetchError::new(url, kind, started.elapsed());
                    if error.is_transient() {
                        if let Some(delay) = self.retry.delay_after(attempt) {
                            warn!(
                                url,
                                attempt = attempt + 1,
                                error = %error,
                                "transient fetch failure, backing off"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        }
    }

    /// One GET attempt: status and content-type checks plus a bounded,
    /// streamed body read. Returns the raw bytes on success.
    async fn attempt(&self, parsed: Url) -> Result<Vec<u8>, FetchErrorKind> {
        let response = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchErrorKind::Http(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(FetchErrorKind::UnsupportedContentType(content_type));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchErrorKind::TooLarge { limit: self.max_bytes });
            }
        }

        // Stream the body so an undeclared oversized response is cut off at
        // the cap rather than buffered whole.
        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await.map_err(|err| classify_transport(&err))? {
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(FetchErrorKind::TooLarge { limit: self.max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

/// Map a reqwest transport error onto the fetch taxonomy.
fn classify_transport(err: &reqwest::Error) -> FetchErrorKind {
    if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if let Some(status) = err.status() {
        FetchErrorKind::Http(status.as_u16())
    } else {
        FetchErrorKind::Network(err.to_string())
    }
}
