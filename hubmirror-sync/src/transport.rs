//! Shared HTTP plumbing for the GitHub and Notion clients: client
//! construction, bounded retries and JSON decoding.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);
/// Error bodies are kept in messages up to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Retry behaviour for transient failures (429, 5xx, timeouts, refused
/// connections). Other failures are returned on the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.max_delay)
    }
}

/// Whether a request may be sent again after the server might have acted on
/// the previous attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    /// Reads and overwrites: a repeat leaves the same state behind.
    Idempotent,
    /// Creates: repeated only when the previous attempt was provably not
    /// processed (throttled, or the connection was never established).
    Undelivered,
}

impl Replay {
    pub(crate) fn retries_status(self, status: StatusCode) -> bool {
        match self {
            Replay::Idempotent => is_retryable_status(status),
            Replay::Undelivered => status == StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub(crate) fn retries_error(self, err: &reqwest::Error) -> bool {
        match self {
            Replay::Idempotent => err.is_timeout() || err.is_connect(),
            Replay::Undelivered => err.is_connect(),
        }
    }
}

pub(crate) fn build_client(
    service: &'static str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<Client, ApiError> {
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|source| ApiError::Http { service, source })
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `Retry-After` in its delay-seconds form.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    service: &'static str,
    body: &[u8],
) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|source| ApiError::Decode { service, source })
}

fn clip_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body
    } else {
        let mut clipped: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        clipped.push('…');
        clipped
    }
}

/// Send the request produced by `build`, retrying the transient failures
/// `replay` allows, and decode a successful body as `T`. Response headers
/// are returned alongside.
pub(crate) async fn send_json<T, F>(
    service: &'static str,
    policy: &RetryPolicy,
    replay: Replay,
    mut build: F,
) -> Result<(T, HeaderMap), ApiError>
where
    T: DeserializeOwned,
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 1usize;
    let mut delay = policy.initial_delay;

    loop {
        let (err, requested_wait) = match build().send().await {
            Ok(response) if response.status().is_success() => {
                let headers = response.headers().clone();
                let body = response
                    .bytes()
                    .await
                    .map_err(|source| ApiError::Http { service, source })?;
                return Ok((decode_json(service, &body)?, headers));
            }
            Ok(response) => {
                let status = response.status();
                let wait = retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                let err = ApiError::Status {
                    service,
                    status: status.as_u16(),
                    body: clip_body(body),
                };
                if !replay.retries_status(status) {
                    return Err(err);
                }
                (err, wait)
            }
            Err(source) => {
                let transient = replay.retries_error(&source);
                let err = ApiError::Http { service, source };
                if !transient {
                    return Err(err);
                }
                (err, None)
            }
        };

        if attempt >= policy.max_attempts {
            return Err(err);
        }
        let wait = requested_wait.unwrap_or(delay);
        tracing::warn!(
            service,
            attempt,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "transient failure; retrying"
        );
        tokio::time::sleep(wait).await;
        delay = policy.next_delay(delay);
        attempt += 1;
    }
}
