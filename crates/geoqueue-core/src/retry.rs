//! Retry logic with exponential backoff for outbound provider calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::http_client::{
    redacted_url, HttpClient, HttpRequest, HttpResponse, RequestError, RequestFuture,
};

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay after failed attempt `n` is `base * (factor ^ n)`.
    Exponential {
        /// The backoff unit.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Calculate the wait that follows a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `failed_attempt` - The 1-based number of the attempt that just failed
    pub fn delay(self, failed_attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(failed_attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Attempt budget and pacing for the resilient client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// A single attempt with no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, failed_attempt: u32) -> Duration {
        self.backoff.delay(failed_attempt)
    }
}

/// Wraps a transport with exponential-backoff retry for a fixed attempt budget.
///
/// Only 2xx responses come back as `Ok`. Client errors (4xx) fail after one
/// attempt; timeouts, network failures and 5xx responses are retried until
/// the budget is spent, and the last failure is returned with its kind intact.
#[derive(Clone)]
pub struct RetryingHttpClient {
    inner: Arc<dyn HttpClient>,
    config: RetryConfig,
}

impl RetryingHttpClient {
    pub fn new(inner: Arc<dyn HttpClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn send_with_retry(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        self.send_with_attempts(request, self.config.max_attempts)
            .await
    }

    pub async fn send_with_attempts(
        &self,
        request: HttpRequest,
        max_attempts: u32,
    ) -> Result<HttpResponse, RequestError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        let url = redacted_url(&request.url);

        loop {
            debug!(attempt, max_attempts, url = %url, "sending request");

            let error = match self.inner.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!(attempt, status = response.status, "request succeeded");
                    return Ok(response);
                }
                Ok(response) => RequestError::status(&response),
                Err(error) => error,
            };

            if !error.retryable() {
                debug!(attempt, error = %error, "request failed with a terminal error");
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(attempt, error = %error, url = %url, "retry budget exhausted");
                return Err(error);
            }

            let delay = self.config.delay_for_attempt(attempt);
            warn!(
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "request failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl HttpClient for RetryingHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> RequestFuture<'a> {
        Box::pin(self.send_with_retry(request))
    }
}
