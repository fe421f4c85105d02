//! HTTP transport shared by every fetch strategy.
//!
//! Each request carries the configured timeout. Transient failures
//! (connection errors, timeouts, HTTP 429 and 5xx) are retried here with
//! exponential backoff; higher layers never retry.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::AcquisitionConfig;
use crate::error::{AcquireError, Result};
use crate::logging::truncate_field;

const MAX_ERROR_BODY: usize = 200;

/// A successful (2xx) response with its body read to text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Thin wrapper around [`reqwest::Client`] adding the retry policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
    max_retry_delay: Duration,
}

impl HttpClient {
    /// Create a client from the acquisition configuration.
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .danger_accept_invalid_certs(!config.verify_tls())
            .build()
            .map_err(|e| {
                AcquireError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            max_retries: config.max_retries(),
            retry_base_delay: config.retry_base_delay(),
            max_retry_delay: config.max_retry_delay(),
        })
    }

    /// Issue a GET, retrying transient failures.
    ///
    /// # Errors
    ///
    /// [`AcquireError::Transport`] when no response arrived or the token was
    /// cancelled, including mid-request. [`AcquireError::Protocol`] for a
    /// non-2xx status once retries are spent.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::transport("cancelled"));
            }

            let outcome = tokio::select! {
                outcome = self.get_once(url, query) => outcome,
                _ = cancel.cancelled() => {
                    return Err(AcquireError::transport("cancelled"));
                }
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err((error, retry_after)) if error.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.calculate_backoff(attempt, retry_after);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retryable error: {}",
                        error
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => {
                            return Err(AcquireError::transport("cancelled"));
                        }
                    }
                    attempt += 1;
                }
                Err((error, _)) => return Err(error),
            }
        }
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<HttpResponse, (AcquireError, Option<u64>)> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| (transport_error(e), None))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response.text().await.map_err(|e| (transport_error(e), None))?;

        if status.is_success() {
            Ok(HttpResponse {
                status: status.as_u16(),
                content_type,
                body,
            })
        } else {
            Err((
                AcquireError::http_status(status.as_u16(), truncate_field(&body, MAX_ERROR_BODY)),
                retry_after,
            ))
        }
    }

    /// Exponential backoff with jitter.
    ///
    /// `base * 2^attempt` with the exponent capped at 5, plus up to `base`
    /// (at most one second) of jitter. A `Retry-After` header replaces the base.
    /// The total never exceeds the configured maximum retry delay.
    fn calculate_backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let base = retry_after
            .map(Duration::from_secs)
            .unwrap_or(self.retry_base_delay)
            .min(self.max_retry_delay);
        let capped = attempt.min(5);
        let jitter_cap = self.retry_base_delay.as_millis().min(1000) as u64;
        let jitter_ms = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_cap)
        };
        base.saturating_mul(1 << capped)
            .saturating_add(Duration::from_millis(jitter_ms))
            .min(self.max_retry_delay)
    }
}

fn transport_error(e: reqwest::Error) -> AcquireError {
    if e.is_timeout() {
        AcquireError::transport(format!("request timed out: {e}"))
    } else {
        AcquireError::transport(e.to_string())
    }
}
