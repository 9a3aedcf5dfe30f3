//! Bounded retry with exponential backoff for transient and rate-limit
//! failures. Fatal classes are never retried.

use autoads_core::config::GraphConfig;
use autoads_core::error::GatewayError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            attempts: config.retry_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Run `op` up to `attempts` times. Retries only retryable errors;
    /// rate-limit failures back off longer than plain transients.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.attempts.max(1) => {
                    let delay = self.delay_for(&err, attempt);
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying gateway call"
                    );
                    metrics::counter!("gateway.retries").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn delay_for(&self, err: &GatewayError, attempt: u32) -> Duration {
        let base = match err {
            GatewayError::RateLimited {
                retry_after_secs: Some(secs),
            } => return Duration::from_secs(*secs),
            // Rate limits are aggregate; back off harder than a flaky socket.
            GatewayError::RateLimited { .. } => self.base_delay * 4,
            _ => self.base_delay,
        };
        let exp = base.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = rand::thread_rng().gen_range(0..=self.base_delay.as_millis() as u64 / 2);
        exp + Duration::from_millis(jitter_ms)
    }
}
