//! Progress channel for the live-status viewer.
//!
//! Publishing is fire-and-forget with replace-on-write semantics: each key
//! keeps only the latest message, and the stored value expires at the next
//! local midnight no matter how recently it was written.

use async_trait::async_trait;
use autoads_core::config::RedisConfig;
use autoads_core::error::{AutoAdsError, AutoAdsResult};
use autoads_core::types::ProgressMessage;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde_json::json;
use tracing::{debug, error};

#[async_trait]
pub trait ProgressChannel: Send + Sync {
    /// Publish one human-readable line for `user_key`. Failures are logged
    /// and swallowed; narration must never sink a run.
    async fn publish(&self, user_key: &str, message: &str);
}

/// The viewer reads `{user}-key`; only the latest value matters.
fn channel_key(user_key: &str) -> String {
    format!("{user_key}-key")
}

fn stamp(message: &str) -> String {
    format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
}

/// First instant of the day after `after`.
pub fn next_midnight(after: NaiveDateTime) -> NaiveDateTime {
    after
        .date()
        .succ_opt()
        .unwrap_or(after.date())
        .and_hms_opt(0, 0, 0)
        .unwrap_or(after)
}

fn next_midnight_timestamp() -> i64 {
    let naive = next_midnight(Local::now().naive_local());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp() + 86_400)
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

pub struct RedisProgressChannel {
    client: redis::Client,
}

impl RedisProgressChannel {
    pub fn new(config: &RedisConfig) -> AutoAdsResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AutoAdsError::Cache(format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }

    async fn publish_inner(&self, user_key: &str, message: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = channel_key(user_key);
        let payload = json!({ "message": stamp(message) }).to_string();

        redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        redis::cmd("EXPIREAT")
            .arg(&key)
            .arg(next_midnight_timestamp())
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressChannel for RedisProgressChannel {
    async fn publish(&self, user_key: &str, message: &str) {
        match self.publish_inner(user_key, message).await {
            Ok(()) => {
                metrics::counter!("progress.published").increment(1);
                debug!(user_key, "progress line stored");
            }
            Err(e) => {
                metrics::counter!("progress.publish_errors").increment(1);
                error!(user_key, error = %e, "failed to store progress line");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Keeps the latest line per key in memory, mirroring the replace-on-write
/// contract; the full history is also retained so tests can assert on
/// narration that has already been replaced.
#[derive(Default)]
pub struct LocalProgressChannel {
    latest: DashMap<String, ProgressMessage>,
    history: DashMap<String, Vec<String>>,
}

impl LocalProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, user_key: &str) -> Option<ProgressMessage> {
        self.latest.get(&channel_key(user_key)).map(|m| m.clone())
    }

    /// Every line ever published for the key, oldest first.
    pub fn lines(&self, user_key: &str) -> Vec<String> {
        self.history
            .get(&channel_key(user_key))
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressChannel for LocalProgressChannel {
    async fn publish(&self, user_key: &str, message: &str) {
        let stamped = stamp(message);
        self.history
            .entry(channel_key(user_key))
            .or_default()
            .push(stamped.clone());
        self.latest.insert(
            channel_key(user_key),
            ProgressMessage {
                recipient: user_key.to_string(),
                message: stamped,
                emitted_at: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    #[test]
    fn test_next_midnight_is_start_of_next_day() {
        let evening = NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let midnight = next_midnight(evening);
        assert_eq!(
            midnight,
            NaiveDate::from_ymd_opt(2025, 6, 16)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        // Expiry is pinned to the boundary even right after midnight.
        let morning = NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(0, 0, 1)
            .unwrap();
        assert_eq!(next_midnight(morning).date().day0(), 15);
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_value() {
        let channel = LocalProgressChannel::new();
        channel.publish("7", "Fetching Campaign Data").await;
        channel.publish("7", "Updated Campaign X -> PAUSED").await;

        let latest = channel.latest("7").unwrap();
        assert!(latest.message.contains("PAUSED"));
        assert!(!latest.message.contains("Fetching"));
        // Lines carry a timestamp prefix for the viewer.
        assert!(latest.message.starts_with('['));
    }
}
