//! Bounded retry of transient collaborator failures.
//!
//! Only [`ProviderError::ServiceUnavailable`] is retried. Every other error,
//! and the last transient one, is returned unchanged so the pipeline
//! attributes it to the same stage either way.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use voxlate_core::config::RetryConfig;

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Exponential backoff for the given retry (1-based), capped, plus up to 25% jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let base = exp.min(self.max_backoff);
        let jitter_cap = base.as_millis() as u64 / 4;
        if jitter_cap == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_cap))
    }
}

/// Run `call` until it succeeds, fails non-transiently, or retries run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => {
                if retry > 0 {
                    info!(operation, attempt = retry + 1, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.backoff(retry);
                warn!(
                    operation,
                    attempt = retry,
                    delay_ms = delay.as_millis() as u64,
                    %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
