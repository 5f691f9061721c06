//! Generic retry-with-backoff wrapper.
//!
//! Every outbound call that can fail transiently (source listings, media
//! probes) goes through `with_retry`, parameterized by the caller's
//! retryable-status predicate. Non-retryable errors propagate immediately;
//! exhausting the attempt budget is reported distinctly.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Delay before the (attempt+1)-th try: base * 2^attempt, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("non-retryable: {0}")]
    Fatal(#[source] E),
}

/// Run `op`, retrying on errors the predicate marks transient.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    what: &str,
    is_transient: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_transient(&e) => return Err(RetryError::Fatal(e)),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                let backoff = policy.backoff(attempt - 1);
                let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                warn!(
                    what,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "Transient failure, retrying after backoff"
                );
                tokio::time::sleep(backoff + jitter).await;
            }
        }
    }
}
