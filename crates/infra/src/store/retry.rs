use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::StoreError;

/// Bounded retry with exponential backoff for transient store failures.
///
/// [`RetryPolicy::run`] is for reads. Only errors for which
/// [`StoreError::is_transient`] hold are retried; conflicts, stale revisions
/// and missing documents come back on the first attempt. Writes go through
/// [`RetryPolicy::run_write`], which never replays them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Run a write exactly once. A transient failure leaves the outcome
    /// unknown (the statement may have committed), so it is logged and
    /// returned rather than replayed into a spurious `Concurrency`,
    /// `Duplicate` or `NotFound`.
    pub async fn run_write<T, Fut>(&self, operation: &'static str, write: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let result = write.await;
        if let Err(err) = &result {
            if err.is_transient() {
                tracing::warn!(operation, error = %err, "store write failed with unknown outcome");
            }
        }
        result
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if !err.is_transient() || attempt >= self.max_attempts {
                        if err.is_transient() {
                            tracing::warn!(operation, attempts = attempt, error = %err, "store retries exhausted");
                        }
                        return Err(err);
                    }

                    tracing::debug!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying store operation");
                    sleep(delay).await;
                    delay = (delay * self.backoff_factor).min(self.max_delay);
                }
            }
        }
    }
}
