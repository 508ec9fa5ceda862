//! Bounded retry with exponential backoff for provider and cache calls.

use std::thread;
use std::time::Duration;

use kiln_core::config::RetryConfig;
use kiln_core::recipe::ProviderError;
use tracing::{debug, warn};

use crate::error::{FetchFailure, ResolveError};

/// How many times a transient failure is retried, and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt with no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.backoff_ms)),
        }
    }
}

/// Run `op`, retrying transient failures until the policy is exhausted.
///
/// `NotFound` is returned immediately. `what` names the lookup in logs and
/// in the resulting error.
pub fn run<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> Result<T, ProviderError>,
) -> Result<T, ResolveError> {
    let attempts = policy.attempts.max(1);
    let mut last_message = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = policy.delay_for(attempt - 1);
            warn!(
                "Retrying {what} (attempt {attempt}/{attempts}) after {}ms: {last_message}",
                delay.as_millis()
            );
            thread::sleep(delay);
        }

        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => last_message = e.to_string(),
            Err(e) => {
                debug!("{what}: {e}");
                return Err(ResolveError::ProviderFetch {
                    what: what.to_string(),
                    kind: FetchFailure::NotFound,
                    message: e.to_string(),
                });
            }
        }
    }

    Err(ResolveError::ProviderFetch {
        what: what.to_string(),
        kind: FetchFailure::TransientExhausted { attempts },
        message: format!("gave up after {attempts} attempts: {last_message}"),
    })
}
