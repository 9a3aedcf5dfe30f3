//! Delivery classification — derives whether a campaign's ads are actually
//! serving from the campaign run status and the ads' effective statuses.

use crate::types::{CampaignStatus, DeliveryStatus, EffectiveStatus};

/// Classify a campaign's delivery from its run status and the multiset of
/// its ads' effective statuses.
///
/// Rules are evaluated in a fixed order and the first match wins. The
/// mixed ACTIVE/ADSET_PAUSED tolerance must be checked before the generic
/// blocked-status rule, otherwise a healthy campaign with some paused ad
/// sets would report NOT_DELIVERING.
pub fn classify_delivery(
    campaign_status: CampaignStatus,
    ad_statuses: &[EffectiveStatus],
) -> DeliveryStatus {
    use EffectiveStatus as E;

    // 1. No ads at all.
    if ad_statuses.is_empty() {
        return DeliveryStatus::Inactive;
    }

    // Rules 2-6 only apply to running campaigns.
    if campaign_status != CampaignStatus::Active {
        return DeliveryStatus::Inactive;
    }

    // 2. Every ad serving.
    if ad_statuses.iter().all(|s| *s == E::Active) {
        return DeliveryStatus::Active;
    }

    // 3. Mix of serving ads and paused ad sets, nothing else. Still healthy.
    if ad_statuses.iter().any(|s| *s == E::Active)
        && ad_statuses
            .iter()
            .all(|s| matches!(s, E::Active | E::AdsetPaused))
    {
        return DeliveryStatus::Active;
    }

    // 4. Every ad rejected by review.
    if ad_statuses.iter().all(|s| *s == E::Disapproved) {
        return DeliveryStatus::RecentlyRejected;
    }

    // 5. Every ad sitting under a paused ad set.
    if ad_statuses.iter().all(|s| *s == E::AdsetPaused) {
        return DeliveryStatus::NotDelivering;
    }

    // 6. Nothing serving and at least one ad blocked by review/billing/parent.
    if !ad_statuses.iter().any(|s| *s == E::Active)
        && ad_statuses.iter().any(|s| s.is_blocked())
    {
        return DeliveryStatus::NotDelivering;
    }

    // 7. Everything else.
    DeliveryStatus::Inactive
}
