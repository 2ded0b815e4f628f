//! Eventual consistency helpers for timing-dependent tests.
//!
//! Telemetry leaves the application in batches (export interval) and becomes
//! queryable only after the backend ingests it, so a single immediate check is
//! racy. [`assert_eventually`] polls on a fixed interval until an attempt
//! succeeds or a deadline passes.
//!
//! Failed attempts are treated as "not ready yet" and swallowed. Only the last
//! attempt's error survives, inside [`EventualError::TelemetryNotObserved`].
//! The deadline is checked between attempts, never mid-attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Eventual consistency errors.
#[derive(Debug, Error)]
pub enum EventualError {
    #[error("Invalid poll policy: {0}")]
    InvalidPolicy(String),

    #[error(
        "{label} not observed within {timeout:?} ({attempts} attempts over {elapsed:?}); last error: {last_error}"
    )]
    TelemetryNotObserved {
        label: String,
        attempts: u32,
        elapsed: Duration,
        timeout: Duration,
        last_error: String,
    },
}

/// Fixed-interval polling policy.
///
/// Invariant: `interval > 0` and `timeout >= interval`, so at least one
/// attempt always runs and the loop always makes progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    timeout: Duration,
}

impl PollPolicy {
    /// Create a policy, validating the invariant.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, EventualError> {
        if interval.is_zero() {
            return Err(EventualError::InvalidPolicy(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        if timeout < interval {
            return Err(EventualError::InvalidPolicy(format!(
                "timeout {:?} must be at least the poll interval {:?}",
                timeout, interval
            )));
        }

        Ok(Self { interval, timeout })
    }

    /// Delay between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline measured from the first attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Categories of eventual consistency with documented SLAs.
#[derive(Debug, Clone, Copy)]
pub enum ConsistencyCategory {
    /// OTLP export batch (~1s) plus backend ingestion: poll every 2s for 15s
    TelemetryExport,

    /// Backend container boot, collector and Grafana coming up: 1s for 120s
    BackendStartup,
}

impl ConsistencyCategory {
    /// Get the polling policy for this consistency category.
    pub fn policy(&self) -> PollPolicy {
        match self {
            ConsistencyCategory::TelemetryExport => PollPolicy {
                interval: Duration::from_secs(2),
                timeout: Duration::from_secs(15),
            },
            ConsistencyCategory::BackendStartup => PollPolicy {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(120),
            },
        }
    }
}

/// Outcome of a successful [`assert_eventually`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<T> {
    /// Value returned by the successful attempt.
    pub value: T,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    /// Time from the first attempt to success.
    pub elapsed: Duration,
}

/// Run `attempt` until it returns `Ok` or `policy.timeout()` elapses.
///
/// Attempts are spaced by `policy.interval()`. The sleep before the final
/// attempt is clamped to the time remaining, so a condition that never holds
/// fails after an elapsed time in `[timeout, timeout + interval)` (plus the
/// duration of the last attempt itself).
///
/// # Example
///
/// ```no_run
/// use env_tests::eventual::{assert_eventually, ConsistencyCategory};
///
/// # async fn fetch_metric() -> Result<f64, String> { Ok(1.0) }
/// # async fn example() {
/// let observed = assert_eventually(
///     "metric query",
///     ConsistencyCategory::TelemetryExport.policy(),
///     || fetch_metric(),
/// )
/// .await
/// .expect("Metric should appear within timeout");
/// assert!(observed.value >= 1.0);
/// # }
/// ```
pub async fn assert_eventually<T, E, F, Fut>(
    label: &str,
    policy: PollPolicy,
    mut attempt: F,
) -> Result<Observed<T>, EventualError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let error = match attempt().await {
            Ok(value) => {
                let elapsed = start.elapsed();
                debug!(label, attempts, ?elapsed, "Condition observed");
                return Ok(Observed {
                    value,
                    attempts,
                    elapsed,
                });
            }
            Err(error) => error,
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(EventualError::TelemetryNotObserved {
                label: label.to_string(),
                attempts,
                elapsed,
                timeout: policy.timeout,
                last_error: error.to_string(),
            });
        }

        debug!(label, attempts, error = %error, "Condition not met yet, retrying");

        // Clamp to the remaining time so the last attempt lands on the deadline
        let remaining = policy.timeout.saturating_sub(elapsed);
        sleep(policy.interval.min(remaining)).await;
    }
}
