//! Lease-guarded automation runs.
//!
//! One run evaluates every matched entity exactly once, mutates through the
//! gateway only where the decision requires it, and narrates each step.
//! Per-entity failures never stop sibling entities; auth failures abort the
//! run. The schedule record is read and rewritten only under the lease.

use autoads_aggregator::SpendAggregator;
use autoads_cache::{run_scope_key, Lease, LeaseService, ProgressChannel, ScheduleStore};
use autoads_core::config::AppConfig;
use autoads_core::error::{AutoAdsError, AutoAdsResult, GatewayError};
use autoads_core::types::{
    AccountSnapshot, CachedEntity, CampaignScheduleRecord, CheckStatus, ScheduleScope,
    ScheduleSpec,
};
use autoads_gateway::GraphApi;
use chrono::{Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::decision::{decide, Verdict};

/// Terminal result of one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed(RunStats),
    /// The lease was held by another run; this one was skipped, not queued.
    AlreadyRunning,
    /// Today is outside the schedule's active date window.
    OutOfWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub evaluated: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct AutomationEngine {
    api: Arc<dyn GraphApi>,
    leases: Arc<dyn LeaseService>,
    store: Arc<dyn ScheduleStore>,
    progress: Arc<dyn ProgressChannel>,
    aggregator: SpendAggregator,
    lease_ttl: Duration,
}

impl AutomationEngine {
    pub fn new(
        api: Arc<dyn GraphApi>,
        leases: Arc<dyn LeaseService>,
        store: Arc<dyn ScheduleStore>,
        progress: Arc<dyn ProgressChannel>,
        config: &AppConfig,
    ) -> Self {
        let aggregator = SpendAggregator::new(
            Arc::clone(&api),
            Arc::clone(&progress),
            config.aggregator.clone(),
        );
        Self {
            api,
            leases,
            store,
            progress,
            aggregator,
            lease_ttl: Duration::from_secs(config.engine.lease_ttl_secs),
        }
    }

    /// Run campaign-level automation for one account.
    pub async fn run_campaign_automation(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
    ) -> AutoAdsResult<RunOutcome> {
        spec.validate()?;
        if spec.scope != ScheduleScope::Campaigns {
            return Err(AutoAdsError::Validation(
                "campaign automation requires scope = Campaigns".into(),
            ));
        }

        let Some(lease) = self.begin_run(account_id, user_key, spec).await? else {
            return Ok(self.skipped_outcome(account_id, user_key, spec).await);
        };

        let result = self.campaign_run_guarded(account_id, user_key, spec).await;
        self.end_run(&lease).await;
        result
    }

    /// Run ad-set-level automation for one account, one level below the
    /// campaign loop: campaigns are filtered by the match key, each ad set
    /// is decided by its own CPP.
    pub async fn run_adset_automation(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
        snapshot: &AccountSnapshot,
    ) -> AutoAdsResult<RunOutcome> {
        spec.validate()?;
        if spec.scope != ScheduleScope::AdSets {
            return Err(AutoAdsError::Validation(
                "ad-set automation requires scope = AdSets".into(),
            ));
        }

        let Some(lease) = self.begin_run(account_id, user_key, spec).await? else {
            return Ok(self.skipped_outcome(account_id, user_key, spec).await);
        };

        let result = self
            .adset_run_guarded(account_id, user_key, spec, snapshot)
            .await;
        self.end_run(&lease).await;
        result
    }

    // -----------------------------------------------------------------------
    // Lease bracket
    // -----------------------------------------------------------------------

    /// Window check plus lease acquisition. `Ok(None)` means the run must be
    /// skipped; the caller reports why via [`skipped_outcome`].
    async fn begin_run(
        &self,
        account_id: &str,
        _user_key: &str,
        spec: &ScheduleSpec,
    ) -> AutoAdsResult<Option<Lease>> {
        if !spec.in_window(Local::now().date_naive()) {
            return Ok(None);
        }

        let scope_key = run_scope_key(account_id, &spec.match_key);
        match self.leases.try_acquire(&scope_key, self.lease_ttl).await? {
            autoads_cache::LeaseOutcome::Held(lease) => Ok(Some(lease)),
            autoads_cache::LeaseOutcome::Contended => Ok(None),
        }
    }

    /// Distinguish why [`begin_run`] declined: the window is checked first,
    /// so an out-of-window schedule never reports lease contention.
    async fn skipped_outcome(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
    ) -> RunOutcome {
        if !spec.in_window(Local::now().date_naive()) {
            info!(account_id, "schedule outside its date window, skipping");
            self.progress
                .publish(user_key, "Schedule is outside its active date window.")
                .await;
            RunOutcome::OutOfWindow
        } else {
            info!(account_id, "run already in progress for this scope, skipping");
            self.progress
                .publish(
                    user_key,
                    &format!("A run is already in progress for {account_id}. Skipping."),
                )
                .await;
            RunOutcome::AlreadyRunning
        }
    }

    async fn end_run(&self, lease: &Lease) {
        if let Err(e) = self.leases.release(lease).await {
            // The TTL will reap it; the next run is delayed, not deadlocked.
            error!(scope_key = %lease.scope_key, error = %e, "failed to release run lease");
        }
    }

    // -----------------------------------------------------------------------
    // Campaign run
    // -----------------------------------------------------------------------

    async fn campaign_run_guarded(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
    ) -> AutoAdsResult<RunOutcome> {
        let mut record = match self.store.get(account_id).await? {
            Some(record) if !record.matched.is_empty() => record,
            _ => match self.refresh_record(account_id, user_key, spec).await {
                Ok(record) => record,
                Err(e) => {
                    self.progress
                        .publish(user_key, &format!("Error fetching campaign data: {e}"))
                        .await;
                    return Err(e);
                }
            },
        };

        if record.matched.is_empty() {
            self.progress
                .publish(user_key, "No matched campaign data found.")
                .await;
            record.last_time_checked = Some(Utc::now());
            record.last_check_message = Some("No matched campaign data found.".into());
            self.store.put(&record).await?;
            return Ok(RunOutcome::Completed(RunStats::default()));
        }

        let mut stats = RunStats::default();
        let mut fatal: Option<GatewayError> = None;

        for (campaign_id, entity) in record.matched.iter_mut() {
            stats.evaluated += 1;

            match decide(entity.status, entity.cpp, spec) {
                Verdict::Update(target) => match self.api.set_status(campaign_id, target).await {
                    Ok(()) => {
                        // Keep the in-run copy consistent for later entities
                        // and for the persisted record.
                        entity.status = target.into();
                        stats.updated += 1;
                        info!(campaign_id = %campaign_id, status = %target, "campaign status updated");
                        self.progress
                            .publish(
                                user_key,
                                &format!(
                                    "Updated Campaign {} ID: {campaign_id} -> {target}",
                                    entity.name
                                ),
                            )
                            .await;
                    }
                    Err(e) if e.is_fatal_for_run() => {
                        fatal = Some(e);
                        break;
                    }
                    Err(e) => {
                        stats.failed += 1;
                        warn!(campaign_id = %campaign_id, error = %e, "campaign status update failed");
                        self.progress
                            .publish(
                                user_key,
                                &format!("Error updating {campaign_id} to {target}: {e}"),
                            )
                            .await;
                    }
                },
                Verdict::AlreadyCorrect(_) | Verdict::Remains => {
                    stats.unchanged += 1;
                    self.progress
                        .publish(
                            user_key,
                            &format!(
                                "Campaign {} ID: {campaign_id} remains {}",
                                entity.name, entity.status
                            ),
                        )
                        .await;
                }
            }
        }

        if let Some(e) = fatal {
            self.finish_record(&mut record, CheckStatus::Failed, format!("Error: {e}"))
                .await?;
            self.progress
                .publish(user_key, &format!("Run aborted: {e}"))
                .await;
            return Err(e.into());
        }

        let (status, message) = if stats.failed == 0 {
            if stats.updated > 0 {
                (
                    CheckStatus::Success,
                    "Successfully updated Campaigns statuses.".to_string(),
                )
            } else {
                (CheckStatus::Success, "No status changes required.".to_string())
            }
        } else {
            (
                CheckStatus::Failed,
                format!("{} of {} updates failed.", stats.failed, stats.evaluated),
            )
        };

        self.progress.publish(user_key, &message).await;
        self.finish_record(&mut record, status, message).await?;

        info!(
            account_id,
            evaluated = stats.evaluated,
            updated = stats.updated,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "campaign automation run finished"
        );
        Ok(RunOutcome::Completed(stats))
    }

    /// Rebuild the matched-entity map from a fresh aggregation snapshot.
    async fn refresh_record(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
    ) -> AutoAdsResult<CampaignScheduleRecord> {
        self.progress
            .publish(user_key, &format!("Fetching Campaign Data for {account_id}"))
            .await;

        let snapshot = self
            .aggregator
            .aggregate_account(account_id, Local::now().date_naive())
            .await?;

        let mut record = CampaignScheduleRecord::new(account_id);
        for campaign in snapshot.campaigns.values() {
            if !spec.matching.matches(&campaign.name, &spec.match_key) {
                continue;
            }
            record.matched.insert(
                campaign.id.clone(),
                CachedEntity {
                    name: campaign.name.clone(),
                    status: campaign.status,
                    // Absent CPP reads as 0, matching how schedules treat
                    // campaigns that have no results yet.
                    cpp: campaign.cpp.unwrap_or(0.0),
                },
            );
        }

        info!(
            account_id,
            matched = record.matched.len(),
            match_key = %spec.match_key,
            "matched campaigns refreshed from snapshot"
        );
        Ok(record)
    }

    /// Persist bookkeeping together with the updated entity map, so the
    /// stored record always reflects the decisions actually written.
    async fn finish_record(
        &self,
        record: &mut CampaignScheduleRecord,
        status: CheckStatus,
        message: String,
    ) -> AutoAdsResult<()> {
        record.last_time_checked = Some(Utc::now());
        record.last_check_status = Some(status);
        record.last_check_message = Some(message);
        self.store.put(record).await
    }

    // -----------------------------------------------------------------------
    // Ad-set run
    // -----------------------------------------------------------------------

    async fn adset_run_guarded(
        &self,
        account_id: &str,
        user_key: &str,
        spec: &ScheduleSpec,
        snapshot: &AccountSnapshot,
    ) -> AutoAdsResult<RunOutcome> {
        let mut stats = RunStats::default();

        for campaign in snapshot.campaigns.values() {
            if !spec.matching.matches(&campaign.name, &spec.match_key) {
                continue;
            }

            for adset in campaign.adsets.values() {
                stats.evaluated += 1;
                let metric = adset.cpp.unwrap_or(0.0);

                match decide(adset.status, metric, spec) {
                    Verdict::Update(target) => match self.api.set_status(&adset.id, target).await {
                        Ok(()) => {
                            stats.updated += 1;
                            info!(adset_id = %adset.id, status = %target, "ad set status updated");
                            self.progress
                                .publish(
                                    user_key,
                                    &format!(
                                        "Updated AdSet {} ({}) to {target}",
                                        adset.name, adset.id
                                    ),
                                )
                                .await;
                        }
                        Err(e) if e.is_fatal_for_run() => {
                            self.progress
                                .publish(user_key, &format!("Run aborted: {e}"))
                                .await;
                            return Err(e.into());
                        }
                        Err(e) => {
                            stats.failed += 1;
                            warn!(adset_id = %adset.id, error = %e, "ad set status update failed");
                            self.progress
                                .publish(
                                    user_key,
                                    &format!("Error updating {} to {target}: {e}", adset.id),
                                )
                                .await;
                        }
                    },
                    Verdict::AlreadyCorrect(_) | Verdict::Remains => {
                        stats.unchanged += 1;
                        self.progress
                            .publish(
                                user_key,
                                &format!(
                                    "AdSet {} ({}) remains {}",
                                    adset.name, adset.id, adset.status
                                ),
                            )
                            .await;
                    }
                }
            }
        }

        self.progress
            .publish(user_key, &format!("Processing {account_id} completed"))
            .await;

        info!(
            account_id,
            evaluated = stats.evaluated,
            updated = stats.updated,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "ad-set automation run finished"
        );
        Ok(RunOutcome::Completed(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autoads_cache::{LocalLeaseService, LocalProgressChannel, LocalScheduleStore};
    use autoads_core::error::GatewayError;
    use autoads_core::matching::MatchStrategy;
    use autoads_core::types::{
        AdAccount, AdSetSnapshot, Campaign, CampaignInsight, CampaignStatus, Direction,
        Identity, RunStatus, SpendTotals,
    };
    use autoads_gateway::AccountBundle;
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockApi {
        bundle: AccountBundle,
        bundle_calls: AtomicUsize,
        mutations: Mutex<Vec<(String, RunStatus)>>,
        failing_entities: Mutex<HashSet<String>>,
    }

    impl MockApi {
        fn new(bundle: AccountBundle) -> Self {
            Self {
                bundle,
                bundle_calls: AtomicUsize::new(0),
                mutations: Mutex::new(Vec::new()),
                failing_entities: Mutex::new(HashSet::new()),
            }
        }

        fn mutations(&self) -> Vec<(String, RunStatus)> {
            self.mutations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphApi for MockApi {
        async fn identity(&self) -> Result<Identity, GatewayError> {
            Ok(Identity {
                id: "me".into(),
                name: None,
            })
        }

        async fn ad_accounts(&self) -> Result<Vec<AdAccount>, GatewayError> {
            Ok(Vec::new())
        }

        async fn account_bundle(
            &self,
            _account_id: &str,
            _date: NaiveDate,
        ) -> Result<AccountBundle, GatewayError> {
            self.bundle_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bundle.clone())
        }

        async fn set_status(
            &self,
            entity_id: &str,
            status: RunStatus,
        ) -> Result<(), GatewayError> {
            if self.failing_entities.lock().unwrap().contains(entity_id) {
                return Err(GatewayError::Resource {
                    code: 100,
                    message: "mutation rejected".into(),
                });
            }
            self.mutations
                .lock()
                .unwrap()
                .push((entity_id.to_string(), status));
            Ok(())
        }
    }

    struct Harness {
        api: Arc<MockApi>,
        leases: Arc<LocalLeaseService>,
        store: Arc<LocalScheduleStore>,
        progress: Arc<LocalProgressChannel>,
        engine: AutomationEngine,
    }

    fn harness(bundle: AccountBundle) -> Harness {
        let api = Arc::new(MockApi::new(bundle));
        let leases = Arc::new(LocalLeaseService::new());
        let store = Arc::new(LocalScheduleStore::new());
        let progress = Arc::new(LocalProgressChannel::new());
        let engine = AutomationEngine::new(
            api.clone(),
            leases.clone(),
            store.clone(),
            progress.clone(),
            &AppConfig::default(),
        );
        Harness {
            api,
            leases,
            store,
            progress,
            engine,
        }
    }

    fn summer_sale_bundle() -> AccountBundle {
        AccountBundle {
            campaigns: vec![Campaign {
                id: "c1".into(),
                name: "2025-SummerSale-PH".into(),
                status: CampaignStatus::Active,
                daily_budget: Some(100_000),
                budget_remaining: Some(40_000),
                account_id: None,
            }],
            adsets: Vec::new(),
            ads: Vec::new(),
            insights: vec![CampaignInsight {
                campaign_id: Some("c1".into()),
                spend: 600.0,
                cost_per_result: Some(60.0),
            }],
        }
    }

    fn off_spec(threshold: f64, match_key: &str) -> ScheduleSpec {
        ScheduleSpec {
            scope: ScheduleScope::Campaigns,
            match_key: match_key.into(),
            threshold,
            direction: Direction::Off,
            date_start: None,
            date_end: None,
            matching: MatchStrategy::default(),
        }
    }

    #[tokio::test]
    async fn test_off_schedule_pauses_matching_campaign() {
        let h = harness(summer_sale_bundle());
        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &off_spec(50.0, "SummerSale"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(RunStats {
                evaluated: 1,
                updated: 1,
                unchanged: 0,
                failed: 0,
            })
        );
        assert_eq!(h.api.mutations(), vec![("c1".to_string(), RunStatus::Paused)]);

        // Narration must have announced the PAUSED transition.
        assert!(h
            .progress
            .lines("7")
            .iter()
            .any(|line| line.contains("PAUSED")));

        // The record persists the decision that was actually written.
        let record = h.store.get("42").await.unwrap().unwrap();
        assert_eq!(record.matched["c1"].status, CampaignStatus::Paused);
        assert_eq!(record.last_check_status, Some(CheckStatus::Success));
    }

    #[tokio::test]
    async fn test_second_run_reuses_record_and_stays_idempotent() {
        let h = harness(summer_sale_bundle());
        let spec = off_spec(50.0, "SummerSale");

        h.engine
            .run_campaign_automation("42", "7", &spec)
            .await
            .unwrap();
        assert_eq!(h.api.bundle_calls.load(Ordering::SeqCst), 1);

        let second = h
            .engine
            .run_campaign_automation("42", "7", &spec)
            .await
            .unwrap();

        // Cached record, no refetch, and no second mutation: the entity is
        // already in its target state.
        assert_eq!(h.api.bundle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.api.mutations().len(), 1);
        assert_eq!(
            second,
            RunOutcome::Completed(RunStats {
                evaluated: 1,
                updated: 0,
                unchanged: 1,
                failed: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_below_threshold_remains_without_mutation() {
        let h = harness(summer_sale_bundle());
        // CPP 60 is below an OFF threshold of 80; nothing to do.
        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &off_spec(80.0, "SummerSale"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(RunStats {
                evaluated: 1,
                updated: 0,
                unchanged: 1,
                failed: 0,
            })
        );
        assert!(h.api.mutations().is_empty());
        assert!(h
            .progress
            .lines("7")
            .iter()
            .any(|line| line.contains("remains ACTIVE")));
    }

    #[tokio::test]
    async fn test_non_matching_campaigns_ignored() {
        let h = harness(summer_sale_bundle());
        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &off_spec(50.0, "WinterPush"))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed(RunStats::default()));
        assert!(h.api.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_contended_lease_skips_run() {
        let h = harness(summer_sale_bundle());
        let scope_key = run_scope_key("42", "SummerSale");
        let _held = h
            .leases
            .try_acquire(&scope_key, Duration::from_secs(60))
            .await
            .unwrap();

        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &off_spec(50.0, "SummerSale"))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::AlreadyRunning);
        assert!(h.api.mutations().is_empty());
        assert_eq!(h.api.bundle_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lease_released_after_run() {
        let h = harness(summer_sale_bundle());
        h.engine
            .run_campaign_automation("42", "7", &off_spec(50.0, "SummerSale"))
            .await
            .unwrap();

        let scope_key = run_scope_key("42", "SummerSale");
        assert!(h
            .leases
            .try_acquire(&scope_key, Duration::from_secs(60))
            .await
            .unwrap()
            .is_held());
    }

    #[tokio::test]
    async fn test_out_of_window_schedule_declines() {
        let h = harness(summer_sale_bundle());
        let mut spec = off_spec(50.0, "SummerSale");
        spec.date_end = NaiveDate::from_ymd_opt(2000, 1, 1);

        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &spec)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::OutOfWindow);
        assert!(h.api.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_entity_failure_does_not_stop_siblings() {
        let mut bundle = summer_sale_bundle();
        bundle.campaigns.push(Campaign {
            id: "c2".into(),
            name: "2025-SummerSale-VN".into(),
            status: CampaignStatus::Active,
            daily_budget: Some(80_000),
            budget_remaining: Some(10_000),
            account_id: None,
        });
        bundle.insights.push(CampaignInsight {
            campaign_id: Some("c2".into()),
            spend: 650.0,
            cost_per_result: Some(70.0),
        });

        let h = harness(bundle);
        h.api.failing_entities.lock().unwrap().insert("c1".into());

        let outcome = h
            .engine
            .run_campaign_automation("42", "7", &off_spec(50.0, "SummerSale"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(RunStats {
                evaluated: 2,
                updated: 1,
                unchanged: 0,
                failed: 1,
            })
        );
        assert_eq!(h.api.mutations(), vec![("c2".to_string(), RunStatus::Paused)]);

        let record = h.store.get("42").await.unwrap().unwrap();
        assert_eq!(record.matched["c1"].status, CampaignStatus::Active);
        assert_eq!(record.matched["c2"].status, CampaignStatus::Paused);
        assert_eq!(record.last_check_status, Some(CheckStatus::Failed));
    }

    #[tokio::test]
    async fn test_wrong_scope_rejected_before_any_call() {
        let h = harness(summer_sale_bundle());
        let mut spec = off_spec(50.0, "SummerSale");
        spec.scope = ScheduleScope::AdSets;

        assert!(h
            .engine
            .run_campaign_automation("42", "7", &spec)
            .await
            .is_err());
        assert_eq!(h.api.bundle_calls.load(Ordering::SeqCst), 0);
    }

    fn adset_snapshot() -> AccountSnapshot {
        let mut adsets = BTreeMap::new();
        adsets.insert(
            "as1".to_string(),
            AdSetSnapshot {
                id: "as1".into(),
                name: "Broad".into(),
                status: CampaignStatus::Active,
                cpp: Some(60.0),
                ad_statuses: Vec::new(),
            },
        );
        adsets.insert(
            "as2".to_string(),
            AdSetSnapshot {
                id: "as2".into(),
                name: "Lookalike".into(),
                status: CampaignStatus::Active,
                cpp: Some(10.0),
                ad_statuses: Vec::new(),
            },
        );

        let mut campaigns = BTreeMap::new();
        campaigns.insert(
            "c1".to_string(),
            autoads_core::types::CampaignSnapshot {
                id: "c1".into(),
                name: "2025-SummerSale-PH".into(),
                status: CampaignStatus::Active,
                daily_budget: 1000.0,
                budget_remaining: 400.0,
                estimated_spent: 600.0,
                insights_spend: 600.0,
                spend_difference: 0.0,
                cpp: Some(60.0),
                delivery: autoads_core::types::DeliveryStatus::Active,
                adsets,
                ad_statuses: Vec::new(),
            },
        );

        AccountSnapshot {
            account_id: "42".into(),
            account_name: "Main".into(),
            campaigns,
            totals: SpendTotals::default(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_adset_run_decides_each_adset_by_its_own_cpp() {
        let h = harness(AccountBundle::default());
        let mut spec = off_spec(50.0, "SummerSale");
        spec.scope = ScheduleScope::AdSets;

        let outcome = h
            .engine
            .run_adset_automation("42", "7", &spec, &adset_snapshot())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(RunStats {
                evaluated: 2,
                updated: 1,
                unchanged: 1,
                failed: 0,
            })
        );
        // Only the ad set at/above the threshold was paused.
        assert_eq!(h.api.mutations(), vec![("as1".to_string(), RunStatus::Paused)]);
        assert!(h
            .progress
            .lines("7")
            .iter()
            .any(|line| line.contains("Updated AdSet Broad (as1) to PAUSED")));
    }
}
