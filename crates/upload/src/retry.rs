//! Bounded retries with exponential backoff for transient storage faults

use pkgreg_config::RetryConfig;
use pkgreg_errors::Error;
use pkgreg_events::{AppEvent, EventEmitter, GeneralEvent};
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry a transient failure
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            backoff_multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Exponential backoff delay with jitter for the given attempt (1-based)
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // Precision loss acceptable for backoff calculations
        #[allow(clippy::cast_precision_loss)]
        let base_delay = self.initial_delay.as_millis().min(u128::from(u64::MAX)) as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_delay = self.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = (base_delay * self.backoff_multiplier.powi(exponent)).min(max_delay);

        let jitter = delay * self.jitter_factor * (rand::random::<f64>() - 0.5);
        // max(0.0) keeps the value non-negative before the cast
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let final_delay = (delay + jitter).max(0.0).round() as u64;

        Duration::from_millis(final_delay)
    }

    /// Run `op`, retrying while it fails with a transient error
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient one once
    /// retries are exhausted.
    pub async fn run<T, F, Fut, E>(&self, operation: &str, events: &E, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        E: EventEmitter,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms,
                        error = %err,
                        "transient failure, retrying"
                    );
                    events.emit(AppEvent::General(GeneralEvent::RetryScheduled {
                        operation: operation.to_string(),
                        attempt,
                        delay_ms,
                        error: err.to_string(),
                    }));
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgreg_errors::{PackageError, StorageError};
    use pkgreg_events::EventSender;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NO_EVENTS: Option<EventSender> = None;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run("flaky", &NO_EVENTS, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::Unavailable {
                        message: "blip".to_string(),
                    }
                    .into())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), Error> = fast()
            .run("conflict", &NO_EVENTS, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PackageError::Conflict {
                    identity: "x".to_string(),
                }
                .into())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), Error> = fast()
            .run("down", &NO_EVENTS, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::Unavailable {
                    message: "down".to_string(),
                }
                .into())
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
