//! Concurrent metric aggregation: fans per-account batch calls out across a
//! bounded worker pool, joins the results into per-campaign snapshots, and
//! narrates progress. Per-account failures land in an error manifest; only
//! identity resolution and auth failures abort the whole run.

pub mod join;

use autoads_cache::ProgressChannel;
use autoads_core::config::AggregatorConfig;
use autoads_core::error::{AutoAdsResult, GatewayError};
use autoads_core::types::{AccountSnapshot, AdAccount, AggregateReport, SpendTotals};
use autoads_gateway::{AccountBundle, GraphApi};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

pub use join::build_account_snapshot;

pub struct SpendAggregator {
    api: Arc<dyn GraphApi>,
    progress: Arc<dyn ProgressChannel>,
    config: AggregatorConfig,
}

impl SpendAggregator {
    pub fn new(
        api: Arc<dyn GraphApi>,
        progress: Arc<dyn ProgressChannel>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            api,
            progress,
            config,
        }
    }

    /// Fetch and join a single known account, without the identity call or
    /// the fan-out.
    pub async fn aggregate_account(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<AccountSnapshot, GatewayError> {
        let bundle = self.api.account_bundle(account_id, date).await?;
        let account = AdAccount {
            id: format!("act_{account_id}"),
            name: String::new(),
        };
        Ok(build_account_snapshot(&account, &bundle, Utc::now()))
    }

    /// Aggregate today's performance snapshot across every account visible
    /// to the token. Returns a best-effort report; see the error manifest
    /// for accounts that failed.
    pub async fn aggregate(&self, user_key: &str, date: NaiveDate) -> AutoAdsResult<AggregateReport> {
        let deadline = Instant::now() + std::time::Duration::from_secs(self.config.run_deadline_secs);

        // Single identity call; no per-account fallback if it fails.
        let identity = self.api.identity().await?;
        let accounts = self.api.ad_accounts().await?;

        info!(
            user = %identity.id,
            accounts = accounts.len(),
            "starting spend aggregation"
        );
        self.progress
            .publish(
                user_key,
                &format!("Fetching spend data for {} ad accounts", accounts.len()),
            )
            .await;

        let mut snapshots: BTreeMap<String, AccountSnapshot> = BTreeMap::new();
        let mut errors: BTreeMap<String, GatewayError> = BTreeMap::new();
        let mut totals = SpendTotals::default();
        let mut complete = true;

        let batch_size = self.config.account_batch_size.max(1);
        let batch_count = accounts.len().div_ceil(batch_size);

        for (batch_index, batch) in accounts.chunks(batch_size).enumerate() {
            if Instant::now() >= deadline {
                warn!(batch = batch_index + 1, "run deadline reached, returning partial result");
                complete = false;
                mark_unfinished(batch, &snapshots, &mut errors);
                for later in accounts.chunks(batch_size).skip(batch_index + 1) {
                    mark_unfinished(later, &snapshots, &mut errors);
                }
                break;
            }

            self.progress
                .publish(
                    user_key,
                    &format!(
                        "Processing batch {}/{} ({} accounts)",
                        batch_index + 1,
                        batch_count,
                        batch.len()
                    ),
                )
                .await;

            // Bounded fan-out: at most `batch_size` in-flight account
            // fetches, because the platform rate-limits in aggregate.
            let mut workers: JoinSet<(AdAccount, Result<AccountBundle, GatewayError>)> =
                JoinSet::new();
            for account in batch {
                let api = Arc::clone(&self.api);
                let account = account.clone();
                workers.spawn(async move {
                    let bundle = api.account_bundle(account.bare_id(), date).await;
                    (account, bundle)
                });
            }

            // Merge in completion order, not submission order.
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let joined = match tokio::time::timeout(remaining, workers.join_next()).await {
                    Ok(Some(joined)) => joined,
                    Ok(None) => break,
                    Err(_) => {
                        warn!("run deadline reached mid-batch, returning partial result");
                        complete = false;
                        workers.abort_all();
                        break;
                    }
                };

                let (account, result) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "account worker died");
                        continue;
                    }
                };

                match result {
                    Ok(bundle) => {
                        let snapshot = build_account_snapshot(&account, &bundle, Utc::now());
                        totals.accumulate(&snapshot.totals);
                        self.progress
                            .publish(
                                user_key,
                                &format!(
                                    "Account {} fetched ({} campaigns)",
                                    snapshot.account_id,
                                    snapshot.campaigns.len()
                                ),
                            )
                            .await;
                        snapshots.insert(snapshot.account_id.clone(), snapshot);
                    }
                    Err(err) if err.is_fatal_for_run() => {
                        // The token cannot be fixed mid-run; stop everything.
                        workers.abort_all();
                        self.progress
                            .publish(user_key, &format!("Aggregation aborted: {err}"))
                            .await;
                        return Err(err.into());
                    }
                    Err(err) => {
                        warn!(account_id = account.bare_id(), error = %err, "account fetch failed");
                        self.progress
                            .publish(
                                user_key,
                                &format!("Account {} failed: {err}", account.bare_id()),
                            )
                            .await;
                        errors.insert(account.bare_id().to_string(), err);
                    }
                }
            }

            if !complete {
                mark_unfinished(batch, &snapshots, &mut errors);
                for later in accounts.chunks(batch_size).skip(batch_index + 1) {
                    mark_unfinished(later, &snapshots, &mut errors);
                }
                break;
            }
        }

        info!(
            fetched = snapshots.len(),
            failed = errors.len(),
            complete,
            "spend aggregation finished"
        );

        Ok(AggregateReport {
            identity,
            accounts: snapshots,
            errors,
            totals,
            complete,
        })
    }
}

/// Accounts with neither a snapshot nor an error entry when the deadline
/// fires are recorded as transient failures (retryable next run).
fn mark_unfinished(
    batch: &[AdAccount],
    snapshots: &BTreeMap<String, AccountSnapshot>,
    errors: &mut BTreeMap<String, GatewayError>,
) {
    for account in batch {
        let id = account.bare_id();
        if !snapshots.contains_key(id) && !errors.contains_key(id) {
            errors.insert(
                id.to_string(),
                GatewayError::transient("run deadline exceeded"),
            );
        }
    }
}
