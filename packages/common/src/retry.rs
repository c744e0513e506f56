use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Bounded exponential backoff for idempotent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u8,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u8) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn none() -> Self {
        Self::new(0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 100,
            max_ms: 5_000,
        }
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// Formula: `min(base_ms * 2^(attempt-1) + jitter, max_ms)` (0-25% jitter)
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// the policy is exhausted.
///
/// `op` receives the 1-based attempt number. Only use this for operations
/// that are safe to repeat.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: RetryPolicy,
    operation: &str,
    retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u8) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt: u8 = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= policy.max_retries && retryable(&e) => {
                let delay = calculate_backoff(attempt, policy.base_ms, policy.max_ms);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
