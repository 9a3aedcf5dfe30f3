//! Pure join of one account's bundle into a snapshot.
//!
//! Grouping order does not affect the result; everything here is a
//! deterministic function of the bundle.

use autoads_core::delivery::classify_delivery;
use autoads_core::types::{
    minor_to_major, round2, AccountSnapshot, AdAccount, AdSetSnapshot, CampaignSnapshot,
    EffectiveStatus, SpendTotals,
};
use autoads_gateway::AccountBundle;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Join campaigns, ad sets, ads and insights into a per-campaign snapshot
/// map with account totals.
pub fn build_account_snapshot(
    account: &AdAccount,
    bundle: &AccountBundle,
    fetched_at: DateTime<Utc>,
) -> AccountSnapshot {
    // Ad-set id -> campaign id, for ads that only name their ad set.
    let adset_campaign: HashMap<&str, &str> = bundle
        .adsets
        .iter()
        .filter_map(|adset| {
            adset
                .campaign_id
                .as_deref()
                .map(|campaign_id| (adset.id.as_str(), campaign_id))
        })
        .collect();

    let mut ads_by_adset: HashMap<&str, Vec<EffectiveStatus>> = HashMap::new();
    let mut ads_by_campaign: HashMap<&str, Vec<EffectiveStatus>> = HashMap::new();
    for ad in &bundle.ads {
        if let Some(adset_id) = ad.adset_id.as_deref() {
            ads_by_adset
                .entry(adset_id)
                .or_default()
                .push(ad.effective_status);
        }
        let campaign_id = ad
            .campaign_id
            .as_deref()
            .or_else(|| ad.adset_id.as_deref().and_then(|id| adset_campaign.get(id).copied()));
        if let Some(campaign_id) = campaign_id {
            ads_by_campaign
                .entry(campaign_id)
                .or_default()
                .push(ad.effective_status);
        }
    }

    let mut insights_by_campaign: HashMap<&str, (f64, Option<f64>)> = HashMap::new();
    for row in &bundle.insights {
        if let Some(campaign_id) = row.campaign_id.as_deref() {
            insights_by_campaign.insert(campaign_id, (row.spend, row.cost_per_result));
        }
    }

    let mut campaigns = BTreeMap::new();
    let mut totals = SpendTotals::default();

    for campaign in &bundle.campaigns {
        let daily_budget = minor_to_major(campaign.daily_budget);
        let budget_remaining = minor_to_major(campaign.budget_remaining);
        // Only a meaningful proxy when the campaign runs on a daily budget;
        // lifetime-budget campaigns would otherwise report negative spend.
        let estimated_spent = if campaign.daily_budget.is_some() {
            round2(daily_budget - budget_remaining)
        } else {
            0.0
        };

        let (insights_spend, cpp) = insights_by_campaign
            .get(campaign.id.as_str())
            .copied()
            .unwrap_or((0.0, None));

        let ad_statuses = ads_by_campaign
            .get(campaign.id.as_str())
            .cloned()
            .unwrap_or_default();
        let delivery = classify_delivery(campaign.status, &ad_statuses);

        let mut adsets = BTreeMap::new();
        for adset in &bundle.adsets {
            if adset.campaign_id.as_deref() != Some(campaign.id.as_str()) {
                continue;
            }
            let adset_ad_statuses = match ads_by_adset.get(adset.id.as_str()) {
                Some(statuses) => statuses.clone(),
                // Fall back to the nested connection when the flat ads
                // listing had nothing for this ad set.
                None => adset
                    .ads
                    .as_ref()
                    .map(|page| page.data.iter().map(|ad| ad.effective_status).collect())
                    .unwrap_or_default(),
            };
            adsets.insert(
                adset.id.clone(),
                AdSetSnapshot {
                    id: adset.id.clone(),
                    name: adset.name.clone(),
                    status: adset.status,
                    // Insights are campaign-level; ad-set CPP arrives only
                    // through dispatcher-provided snapshots.
                    cpp: None,
                    ad_statuses: adset_ad_statuses,
                },
            );
        }

        totals.accumulate(&SpendTotals {
            daily_budget,
            budget_remaining,
            spent: estimated_spent,
        });

        campaigns.insert(
            campaign.id.clone(),
            CampaignSnapshot {
                id: campaign.id.clone(),
                name: campaign.name.clone(),
                status: campaign.status,
                daily_budget,
                budget_remaining,
                estimated_spent,
                insights_spend,
                spend_difference: round2(insights_spend - estimated_spent),
                cpp,
                delivery,
                adsets,
                ad_statuses,
            },
        );
    }

    AccountSnapshot {
        account_id: account.bare_id().to_string(),
        account_name: account.name.clone(),
        campaigns,
        totals,
        fetched_at,
    }
}
