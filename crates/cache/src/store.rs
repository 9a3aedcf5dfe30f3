//! Keyed store for per-account schedule records.
//!
//! The record is read and rewritten only under the run's lease, so the
//! store itself needs no locking beyond atomic get/put.

use async_trait::async_trait;
use autoads_core::config::RedisConfig;
use autoads_core::error::{AutoAdsError, AutoAdsResult};
use autoads_core::types::CampaignScheduleRecord;
use dashmap::DashMap;
use tracing::debug;

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, account_id: &str) -> Result<Option<CampaignScheduleRecord>, AutoAdsError>;
    async fn put(&self, record: &CampaignScheduleRecord) -> Result<(), AutoAdsError>;
}

fn record_key(account_id: &str) -> String {
    format!("autoads:schedule:{account_id}")
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

pub struct RedisScheduleStore {
    client: redis::Client,
}

impl RedisScheduleStore {
    pub fn new(config: &RedisConfig) -> AutoAdsResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AutoAdsError::Cache(format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScheduleStore for RedisScheduleStore {
    async fn get(&self, account_id: &str) -> Result<Option<CampaignScheduleRecord>, AutoAdsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AutoAdsError::Cache(format!("redis connection failed: {e}")))?;

        let raw: Option<String> = redis::cmd("GET")
            .arg(record_key(account_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AutoAdsError::Cache(format!("record GET failed: {e}")))?;

        match raw {
            None => Ok(None),
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }

    async fn put(&self, record: &CampaignScheduleRecord) -> Result<(), AutoAdsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AutoAdsError::Cache(format!("redis connection failed: {e}")))?;

        let json = serde_json::to_string(record)?;
        redis::cmd("SET")
            .arg(record_key(&record.account_id))
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AutoAdsError::Cache(format!("record SET failed: {e}")))?;

        debug!(account_id = %record.account_id, "schedule record stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct LocalScheduleStore {
    records: DashMap<String, CampaignScheduleRecord>,
}

impl LocalScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for LocalScheduleStore {
    async fn get(&self, account_id: &str) -> Result<Option<CampaignScheduleRecord>, AutoAdsError> {
        Ok(self.records.get(account_id).map(|r| r.clone()))
    }

    async fn put(&self, record: &CampaignScheduleRecord) -> Result<(), AutoAdsError> {
        self.records
            .insert(record.account_id.clone(), record.clone());
        Ok(())
    }
}
