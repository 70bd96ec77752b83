//! Exponential-backoff retry for cluster API calls.
//!
//! Transient failures (connection errors, 5xx responses) are retried with a
//! growing delay until the policy's elapsed ceiling is reached. Non-transient
//! failures surface immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::FleetError;

/// Backoff parameters for retrying transient accessor failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,

    /// Growth factor applied after every retry.
    pub multiplier: f64,

    /// Ceiling for a single delay.
    pub max_interval: Duration,

    /// Total time budget; once exceeded, the last error is surfaced.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    /// A near-immediate policy for tests.
    pub fn fast() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            multiplier: 2.0,
            max_interval: Duration::from_millis(10),
            max_elapsed: Duration::from_millis(250),
        }
    }

    /// The delay for the given retry attempt (0-based), clamped to `max_interval`.
    pub fn interval(&self, attempt: u32) -> Duration {
        // Clamp before converting: the scaled value can overflow to infinity
        // for large attempt counts, which Duration::from_secs_f64 rejects.
        let scaled = (self.initial_interval.as_secs_f64() * self.multiplier.powf(f64::from(attempt)))
            .min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(scaled)
    }
}

/// Run `op`, retrying transient errors per `policy`.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FleetError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FleetError>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                let delay = policy.interval(attempt);
                if start.elapsed() + delay > policy.max_elapsed {
                    debug!(error = %err, attempt, "retry budget exhausted");
                    return Err(err);
                }
                debug!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_interval_progression() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval(0), Duration::from_millis(500));
        assert_eq!(policy.interval(1), Duration::from_millis(750));
        assert_eq!(policy.interval(2), Duration::from_millis(1125));
        // Large attempts clamp to the per-delay ceiling.
        assert_eq!(policy.interval(30), Duration::from_secs(60));
    }

    #[test]
    fn test_interval_clamps_even_when_scaling_overflows() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_secs(1),
            multiplier: 10.0,
            max_interval: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(60),
        };
        // 10^400 overflows f64 to infinity; the clamp must happen first.
        assert_eq!(policy.interval(400), Duration::from_secs(30));
        assert_eq!(policy.interval(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FleetError::Transport("connection refused".into()))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_surfaces_non_transient_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = retry(&RetryPolicy::fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FleetError::NotFound("a.service".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_elapsed_budget() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(5),
            multiplier: 2.0,
            max_interval: Duration::from_millis(20),
            max_elapsed: Duration::from_millis(40),
        };
        let result: Result<u32, _> = retry(&policy, || async {
            Err(FleetError::Transport("connection refused".into()))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
    }
}
