//! Retry with exponential back-off and jitter for page fetches.
//!
//! [`retry_with_backoff`] wraps a fallible page request and retries transient
//! failures (network errors, HTTP 5xx and 429). Everything else is returned
//! immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

const MAX_DELAY_MS: u64 = 60_000;

/// How many additional attempts a failing page gets, and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first failure. `3` means at most 4 requests.
    pub max_retries: u32,
    /// Base delay; the n-th retry waits roughly `base * 2^(n-1)` ms.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:** [`FetchError::Transport`], and [`FetchError::HttpStatus`]
/// for 5xx and 429.
///
/// **Not retriable:** other statuses (a 404 stays a 404), [`FetchError::Decode`]
/// and [`FetchError::InvalidUrl`].
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Transport(_) => true,
        FetchError::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
        FetchError::Decode { .. } | FetchError::InvalidUrl { .. } => false,
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors.
///
/// Back-off schedule with `backoff_base_ms = 500`:
///
/// | Retry | Sleep before it            |
/// |-------|----------------------------|
/// | 1     | 500 ms × 2⁰ ± 25 % jitter  |
/// | 2     | 500 ms × 2¹ ± 25 % jitter  |
/// | 3     | 500 ms × 2² ± 25 % jitter  |
///
/// Delay is capped at 60 s. On exhaustion the last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = policy
                    .backoff_base_ms
                    .saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "transient page fetch error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
