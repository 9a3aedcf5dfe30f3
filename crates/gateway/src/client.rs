//! Reqwest-backed Graph API client.
//!
//! All calls carry the bearer token and a fixed timeout. Listings follow
//! pagination cursors to completion; per-account fetches go through the
//! batch endpoint to bound request volume against the platform rate limit.

use async_trait::async_trait;
use autoads_core::config::GraphConfig;
use autoads_core::error::{AutoAdsError, AutoAdsResult, GatewayError};
use autoads_core::types::{
    Ad, AdAccount, AdSet, Campaign, CampaignInsight, Identity, Page, RunStatus,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{AccountBundle, GraphApi};
use crate::batch::{parse_batch_response, BatchRequest};
use crate::classify;
use crate::pagination::{collect_all, PageSource};
use crate::retry::RetryPolicy;

pub struct GraphClient {
    http: reqwest::Client,
    root: String,
    access_token: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(config: &GraphConfig, access_token: impl Into<String>) -> AutoAdsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AutoAdsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            root: format!("{}/{}", config.base_url, config.api_version),
            access_token: access_token.into(),
            page_size: config.page_size,
            retry: RetryPolicy::from_config(config),
        })
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, GatewayError> {
        metrics::counter!("gateway.requests").increment(1);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| classify::classify_transport(&e))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::transient(format!("unreadable response body: {e}")))?;

        match classify::classify_response(status, &body) {
            None => Ok(body),
            Some(err) => {
                metrics::counter!("gateway.errors").increment(1);
                Err(err)
            }
        }
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, GatewayError> {
        metrics::counter!("gateway.requests").increment(1);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify::classify_transport(&e))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::transient(format!("unreadable response body: {e}")))?;

        match classify::classify_response(status, &body) {
            None => Ok(body),
            Some(err) => {
                metrics::counter!("gateway.errors").increment(1);
                Err(err)
            }
        }
    }

    /// Follow a page's `next` cursors until the listing is drained.
    async fn complete_page<T>(&self, first: Page<T>) -> Result<Vec<T>, GatewayError>
    where
        T: DeserializeOwned + Send,
    {
        let Page { mut data, paging } = first;
        let mut next = paging.and_then(|p| p.next);

        while let Some(url) = next {
            let body = self.get_json(&url, &[]).await?;
            let page: Page<T> = parse_page(body)?;
            let Page {
                data: more,
                paging,
            } = page;
            data.extend(more);
            next = paging.and_then(|p| p.next);
        }

        Ok(data)
    }

    fn bundle_requests(account_id: &str, date: NaiveDate) -> Vec<BatchRequest> {
        let day = date.format("%Y-%m-%d").to_string();
        let time_range = format!(r#"{{"since":"{day}","until":"{day}"}}"#);

        let campaigns = relative_url(
            &format!("act_{account_id}/campaigns"),
            &[("fields", "id,name,status,daily_budget,budget_remaining")],
        );
        let adsets = relative_url(
            &format!("act_{account_id}/adsets"),
            &[(
                "fields",
                "id,name,status,campaign_id,ads{id,name,effective_status,adset_id,campaign_id}",
            )],
        );
        let ads = relative_url(
            &format!("act_{account_id}/ads"),
            &[("fields", "id,name,effective_status,adset_id,campaign_id")],
        );
        let insights = relative_url(
            &format!("act_{account_id}/insights"),
            &[
                ("level", "campaign"),
                ("fields", "campaign_id,spend,cost_per_result"),
                ("time_range", &time_range),
            ],
        );

        vec![
            BatchRequest::get(campaigns),
            BatchRequest::get(adsets),
            BatchRequest::get(ads),
            BatchRequest::get(insights),
        ]
    }

    /// Execute one batch call and drain each slot's own pagination.
    async fn fetch_bundle(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<AccountBundle, GatewayError> {
        let requests = Self::bundle_requests(account_id, date);
        let batch_json = serde_json::to_string(&requests)
            .map_err(|e| GatewayError::transient(format!("unencodable batch: {e}")))?;

        let raw = self
            .post_json(&self.root, &json!({ "batch": batch_json }))
            .await?;
        let mut slots = parse_batch_response(&raw, requests.len())?.into_iter();

        // Campaigns, ad sets and ads are required; a failure there is the
        // account's failure.
        let campaigns: Page<Campaign> = parse_page(slots.next().unwrap_or_else(no_slot)?)?;
        let adsets: Page<AdSet> = parse_page(slots.next().unwrap_or_else(no_slot)?)?;
        let ads: Page<Ad> = parse_page(slots.next().unwrap_or_else(no_slot)?)?;

        // Insights degrade to empty on an entity-scoped error; spend then
        // reads as 0 rather than sinking the whole account.
        let insights: Page<CampaignInsight> = match slots.next().unwrap_or_else(no_slot) {
            Ok(body) => parse_page(body)?,
            Err(err @ GatewayError::Resource { .. }) => {
                warn!(account_id, error = %err, "insights slot failed, continuing without spend");
                Page::default()
            }
            Err(err) => return Err(err),
        };

        Ok(AccountBundle {
            campaigns: self.complete_page(campaigns).await?,
            adsets: self.complete_page(adsets).await?,
            ads: self.complete_page(ads).await?,
            insights: self.complete_page(insights).await?,
        })
    }
}

fn no_slot<T>() -> Result<T, GatewayError> {
    Err(GatewayError::transient("batch response missing a slot"))
}

fn parse_page<T: DeserializeOwned>(body: Value) -> Result<Page<T>, GatewayError> {
    serde_json::from_value(body)
        .map_err(|e| GatewayError::transient(format!("unexpected page shape: {e}")))
}

fn relative_url(path: &str, params: &[(&str, &str)]) -> String {
    let mut qs = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        qs.append_pair(key, value);
    }
    format!("{path}?{}", qs.finish())
}

struct AdAccountPages<'a> {
    client: &'a GraphClient,
}

#[async_trait]
impl PageSource<AdAccount> for AdAccountPages<'_> {
    async fn fetch(&self, cursor: Option<&str>) -> Result<Page<AdAccount>, GatewayError> {
        let body = match cursor {
            // `next` cursors are absolute URLs with all parameters baked in.
            Some(next) => self.client.get_json(next, &[]).await?,
            None => {
                let url = format!("{}/me/adaccounts", self.client.root);
                self.client
                    .get_json(
                        &url,
                        &[
                            ("fields", "id,name".to_string()),
                            ("limit", self.client.page_size.to_string()),
                        ],
                    )
                    .await?
            }
        };
        parse_page(body)
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn identity(&self) -> Result<Identity, GatewayError> {
        let url = format!("{}/me", self.root);
        let body = self
            .retry
            .run("identity", || async {
                self.get_json(&url, &[("fields", "id,name".to_string())])
                    .await
            })
            .await?;
        serde_json::from_value(body)
            .map_err(|e| GatewayError::transient(format!("unexpected identity shape: {e}")))
    }

    async fn ad_accounts(&self) -> Result<Vec<AdAccount>, GatewayError> {
        let accounts = self
            .retry
            .run("ad_accounts", || {
                let pages = AdAccountPages { client: self };
                async move { collect_all(&pages).await }
            })
            .await?;
        debug!(count = accounts.len(), "listed ad accounts");
        Ok(accounts)
    }

    async fn account_bundle(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<AccountBundle, GatewayError> {
        self.retry
            .run("account_bundle", || self.fetch_bundle(account_id, date))
            .await
    }

    async fn set_status(&self, entity_id: &str, status: RunStatus) -> Result<(), GatewayError> {
        let url = format!("{}/{}", self.root, entity_id);
        let payload = json!({ "status": status.to_string() });

        // Safe to retry: setting the same target status twice is a no-op on
        // the platform side.
        self.retry
            .run("set_status", || self.post_json(&url, &payload))
            .await?;
        debug!(entity_id, status = %status, "status mutation accepted");
        Ok(())
    }
}
