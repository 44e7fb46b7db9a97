//! Bounded retry with exponential backoff.
//!
//! Transient failures (timeouts, malformed or truncated responses) are retried up to the
//! policy's attempt budget; fatal failures abort on the spot. Exhaustion yields `None`
//! instead of an error so callers can route the work to a fallback path.

use crate::error::{ErrorClass, GenerationError};
use crate::types::{AttemptOutcome, GenerationAttempt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

/// Retry policy shared by batch and single-item calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each further attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on a single wait
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let millis = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Result of a retried operation plus the attempt history.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: Option<T>,
    pub attempts: Vec<GenerationAttempt>,
    pub last_error: Option<GenerationError>,
}

impl<T> RetryOutcome<T> {
    pub fn error_message(&self) -> String {
        self.last_error
            .as_ref()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string())
    }
}

/// Executes generation calls under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails fatally, or the attempt budget is spent.
    ///
    /// `operation` receives the 1-based attempt number. `label` only feeds log context.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        T: AsRef<str>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            let result = operation(attempt).await;
            let elapsed = started.elapsed();

            match result {
                Ok(value) => {
                    attempts.push(GenerationAttempt {
                        attempt,
                        elapsed,
                        outcome: AttemptOutcome::Success {
                            chars: value.as_ref().chars().count(),
                        },
                    });
                    debug!(label, attempt, elapsed_ms = elapsed.as_millis() as u64, "Generation call succeeded");
                    return RetryOutcome {
                        value: Some(value),
                        attempts,
                        last_error: None,
                    };
                }
                Err(err) => match err.class() {
                    ErrorClass::Fatal => {
                        attempts.push(GenerationAttempt {
                            attempt,
                            elapsed,
                            outcome: AttemptOutcome::FatalFailure {
                                message: err.to_string(),
                            },
                        });
                        warn!(label, attempt, error = %err, "Fatal generation failure; not retrying");
                        return RetryOutcome {
                            value: None,
                            attempts,
                            last_error: Some(err),
                        };
                    }
                    ErrorClass::Transient => {
                        attempts.push(GenerationAttempt {
                            attempt,
                            elapsed,
                            outcome: AttemptOutcome::TransientFailure {
                                message: err.to_string(),
                            },
                        });
                        if attempt < max_attempts {
                            let delay = self.policy.delay_after(attempt);
                            warn!(
                                label,
                                attempt,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Transient generation failure; retrying"
                            );
                            last_error = Some(err);
                            sleep(delay).await;
                        } else {
                            error!(
                                label,
                                attempts = max_attempts,
                                error = %err,
                                "Generation retries exhausted"
                            );
                            last_error = Some(err);
                        }
                    }
                },
            }
        }

        RetryOutcome {
            value: None,
            attempts,
            last_error,
        }
    }
}
