//! Retry engine: exponential backoff with jitter, status/error
//! classification, and `Retry-After` honoring.
//!
//! [`run_with_retry`] drives any operation producing an [`HttpResponse`]:
//! transport errors retry when their [`TransportErrorClass`] is configured
//! retryable, responses retry when their status is in `retry_on_status`,
//! and a parseable integer-seconds `Retry-After` header overrides the
//! computed backoff (capped at `max_delay`). [`RetryableClient`] composes
//! the engine over a [`PooledClient`] so every attempt draws a pooled
//! connection.
//!
//! The delay before attempt `k` (1-indexed, so the first possible sleep is
//! before attempt 2) is `min(max_delay, initial_delay × base^(k−1))`; with
//! jitter on, the final delay is uniform over a band of half that width
//! centered slightly above it.
//!
//! # Examples
//!
//! ```no_run
//! use agent_substrate::{
//!     ConnectionPool, HttpMethod, HttpRequest, PoolConfig, PooledClient, RetryConfig,
//!     RetryableClient,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let pool = Arc::new(ConnectionPool::new(PoolConfig::default()));
//! let client = RetryableClient::new(
//!     PooledClient::new(pool),
//!     RetryConfig::default()
//!         .with_max_attempts(5)
//!         .with_initial_delay(Duration::from_millis(500)),
//! );
//!
//! let result = client
//!     .execute(&HttpRequest::new(HttpMethod::Get, "https://api.example.com/v1/models"))
//!     .await;
//! println!("succeeded={} after {} attempts", result.succeeded, result.attempts);
//! # }
//! ```

use crate::http::{HttpRequest, HttpResponse};
use crate::pool::PooledClient;
use crate::{Error, Result};
use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Classes of transport failure the engine can be told to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorClass {
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    /// Any other network-level failure (DNS, broken body, dropped socket).
    Network,
}

/// Classify an error for retry purposes. Non-transport errors return
/// `None` and are never retried.
pub fn classify_error(error: &Error) -> Option<TransportErrorClass> {
    match error {
        Error::Timeout => Some(TransportErrorClass::Timeout),
        Error::Transport(err) => classify_reqwest(err),
        _ => None,
    }
}

fn classify_reqwest(error: &reqwest::Error) -> Option<TransportErrorClass> {
    if error.is_builder() {
        return None;
    }
    if error.is_timeout() {
        return Some(TransportErrorClass::Timeout);
    }
    if error.is_connect() {
        return Some(TransportErrorClass::ConnectionRefused);
    }
    // Walk the source chain for a reset underneath a generic request error.
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset => {
                    return Some(TransportErrorClass::ConnectionReset);
                }
                std::io::ErrorKind::ConnectionRefused => {
                    return Some(TransportErrorClass::ConnectionRefused);
                }
                std::io::ErrorKind::TimedOut => return Some(TransportErrorClass::Timeout),
                _ => {}
            }
        }
        source = err.source();
    }
    Some(TransportErrorClass::Network)
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Schedule seed.
    pub initial_delay: Duration,
    /// Cap on any single delay, including a `Retry-After` override.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub exponential_base: f64,
    /// Randomize each delay to avoid thundering herds.
    pub jitter: bool,
    /// Response statuses that trigger a retry.
    pub retry_on_status: Vec<u16>,
    /// Transport classes that trigger a retry.
    pub retry_on_errors: Vec<TransportErrorClass>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
            exponential_base: 2.0,
            jitter: true,
            retry_on_status: vec![429, 500, 502, 503, 504],
            retry_on_errors: vec![
                TransportErrorClass::Network,
                TransportErrorClass::Timeout,
                TransportErrorClass::ConnectionRefused,
                TransportErrorClass::ConnectionReset,
            ],
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    pub fn with_retry_on_errors(mut self, classes: Vec<TransportErrorClass>) -> Self {
        self.retry_on_errors = classes;
        self
    }

    /// Delay before the upcoming attempt `k` (1-indexed, `k >= 2`).
    ///
    /// Base delay is `min(max_delay, initial_delay × base^(k−1))`. With
    /// jitter, the result is uniform over `[base − r/2, base + r/2)` where
    /// `r = base/2`, keeping every sampled delay inside
    /// `[base/2, 3·base/2]`.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let range = capped_ms / 2.0;
            capped_ms - range / 2.0 + rand::random::<f64>() * range
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms.max(0.0) as u64)
    }

    fn status_retryable(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    fn error_retryable(&self, error: &Error) -> bool {
        classify_error(error).is_some_and(|class| self.retry_on_errors.contains(&class))
    }
}

/// Parse a `Retry-After` header value as whole seconds.
///
/// The HTTP-date form is deliberately not accepted; a date value falls
/// back to the computed backoff schedule.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct RetryResult {
    /// Final response, if any attempt produced one.
    pub response: Option<HttpResponse>,
    /// Attempts actually made (>= 1).
    pub attempts: u32,
    /// Sum of every delay slept between attempts.
    pub total_delay: Duration,
    /// Final transport error when no response was obtained.
    pub last_error: Option<Error>,
    /// True only when a non-retryable response (typically 2xx) was obtained.
    pub succeeded: bool,
}

/// Drive `operation` under the retry policy. See the module docs for the
/// decision table.
pub async fn run_with_retry<F, Fut>(config: &RetryConfig, mut operation: F) -> RetryResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpResponse>>,
{
    let mut total_delay = Duration::ZERO;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(response) => {
                let retryable = config.status_retryable(response.status);
                if !retryable || attempt >= config.max_attempts {
                    return RetryResult {
                        succeeded: !retryable,
                        response: Some(response),
                        attempts: attempt,
                        total_delay,
                        last_error: None,
                    };
                }

                // A parseable Retry-After overrides the schedule, capped at
                // max_delay; the response body is dropped before retrying.
                let delay = response
                    .header("Retry-After")
                    .and_then(parse_retry_after)
                    .map(|d| d.min(config.max_delay))
                    .unwrap_or_else(|| config.delay_before_attempt(attempt + 1));
                debug!(
                    "attempt {attempt} got status {}; retrying in {delay:?}",
                    response.status
                );
                drop(response);
                total_delay += delay;
                sleep(delay).await;
            }
            Err(error) => {
                if !config.error_retryable(&error) || attempt >= config.max_attempts {
                    return RetryResult {
                        response: None,
                        attempts: attempt,
                        total_delay,
                        last_error: Some(error),
                        succeeded: false,
                    };
                }
                let delay = config.delay_before_attempt(attempt + 1);
                debug!("attempt {attempt} failed ({error}); retrying in {delay:?}");
                total_delay += delay;
                sleep(delay).await;
            }
        }
    }
}

/// A [`PooledClient`] with the retry engine wrapped around every request.
#[derive(Debug)]
pub struct RetryableClient {
    client: PooledClient,
    config: RetryConfig,
}

impl RetryableClient {
    pub fn new(client: PooledClient, config: RetryConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute a request, retrying per the configured policy. Each attempt
    /// acquires and releases its own pooled connection.
    pub async fn execute(&self, request: &HttpRequest) -> RetryResult {
        run_with_retry(&self.config, || self.client.execute(request)).await
    }

    pub async fn get(&self, url: &str) -> RetryResult {
        self.execute(&HttpRequest::new(crate::http::HttpMethod::Get, url))
            .await
    }

    pub async fn post_json<T: serde::Serialize>(&self, url: &str, body: &T) -> RetryResult {
        let request = match HttpRequest::new(crate::http::HttpMethod::Post, url).with_json(body) {
            Ok(request) => request,
            Err(err) => {
                return RetryResult {
                    response: None,
                    attempts: 0,
                    total_delay: Duration::ZERO,
                    last_error: Some(err),
                    succeeded: false,
                };
            }
        };
        self.execute(&request).await
    }
}
