//! Rate-limit and backoff handling for outbound GitHub requests.
//!
//! Every request the fetcher or dispatcher makes goes through [`Governor::send`].
//! Rate limiting (429, or 403 with an exhausted quota) suspends just the calling
//! task until the advertised reset and is not counted as a failure. Transient
//! server errors back off exponentially up to a ceiling before surfacing. A
//! process-wide semaphore caps how many requests are in flight at once so that
//! concurrent workers cannot overrun the host.

use crate::error::{AppError, Result};
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone, Debug)]
pub struct GovernorConfig {
    /// Cap on simultaneously in-flight requests.
    pub max_in_flight: usize,
    /// Initial backoff after a transient server error.
    pub backoff_floor: Duration,
    /// Backoff never grows beyond this.
    pub backoff_ceiling: Duration,
    /// Minimum sleep when rate-limited, even if the reset is in the past.
    pub min_rate_limit_wait: Duration,
    /// How many consecutive transient failures to absorb before surfacing.
    pub max_transient_retries: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            backoff_floor: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
            min_rate_limit_wait: Duration::from_secs(1),
            max_transient_retries: 5,
        }
    }
}

#[derive(Debug)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
    config: GovernorConfig,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            config,
        }
    }

    /// Sends a request, absorbing rate limits and transient server errors.
    ///
    /// Returns the response only on 2xx. Non-retryable statuses surface as
    /// [`AppError::Http`]; exhausted transient retries as
    /// [`AppError::RetriesExhausted`]. The admission permit is held only while
    /// the request is on the wire, never across a backoff sleep.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut backoff = self.config.backoff_floor;
        let mut transient_failures: u32 = 0;

        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| AppError::Config("request body is not clonable".to_string()))?;

            let outcome = {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .expect("semaphore is never closed");
                attempt.send().await
            };

            let response = match outcome {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    let last_error = e.to_string();
                    transient_failures += 1;
                    if transient_failures > self.config.max_transient_retries {
                        return Err(AppError::RetriesExhausted {
                            attempts: transient_failures,
                            last_error,
                        });
                    }
                    tracing::warn!(error = %last_error, backoff_ms = backoff.as_millis() as u64, "connection error, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.backoff_ceiling);
                    continue;
                }
                Err(e) => return Err(AppError::Request(e)),
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if is_rate_limited(status, response.headers()) {
                let wait = rate_limit_wait(response.headers(), self.config.min_rate_limit_wait);
                tracing::warn!(
                    wait_secs = wait.as_secs(),
                    "rate limited, sleeping until reset"
                );
                // Expected behavior, not an error: does not touch the retry budget.
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.is_server_error() {
                transient_failures += 1;
                let last_error = format!("HTTP {status}");
                if transient_failures > self.config.max_transient_retries {
                    return Err(AppError::RetriesExhausted {
                        attempts: transient_failures,
                        last_error,
                    });
                }
                tracing::warn!(%status, backoff_ms = backoff.as_millis() as u64, "server error, backing off");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.backoff_ceiling);
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                return Err(AppError::Auth {
                    status,
                    message: body,
                });
            }
            return Err(AppError::Http { status, body });
        }
    }
}

/// A 429, or a 403 whose rate-limit quota is exhausted, means "wait, then retry".
/// Plain 403s (missing permissions) stay terminal.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && header_str(headers, "x-ratelimit-remaining") == Some("0")
        && headers.contains_key("x-ratelimit-reset")
}

/// How long to sleep before retrying a rate-limited request.
///
/// Prefers `x-ratelimit-reset` (epoch seconds), falls back to `Retry-After`,
/// and never sleeps less than `min_wait`.
fn rate_limit_wait(headers: &HeaderMap, min_wait: Duration) -> Duration {
    let from_reset = header_str(headers, "x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .map(|reset| reset - Utc::now().timestamp());

    let from_retry_after = header_str(headers, "retry-after").and_then(|v| v.parse::<i64>().ok());

    let secs = from_reset.or(from_retry_after).unwrap_or(0).max(0) as u64;
    Duration::from_secs(secs).max(min_wait)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
