//! The boundary trait the aggregator and engine depend on. Injected rather
//! than constructed so tests can drive the pipeline without a network.

use async_trait::async_trait;
use autoads_core::error::GatewayError;
use autoads_core::types::{
    Ad, AdAccount, AdSet, Campaign, CampaignInsight, Identity, RunStatus,
};
use chrono::NaiveDate;

/// Everything fetched for one account in a single batched round trip:
/// campaigns, ad sets with nested ads, ads, and the day's insights.
#[derive(Debug, Clone, Default)]
pub struct AccountBundle {
    pub campaigns: Vec<Campaign>,
    pub adsets: Vec<AdSet>,
    pub ads: Vec<Ad>,
    pub insights: Vec<CampaignInsight>,
}

#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Resolve the authenticated identity. Called once per run; failure
    /// aborts the run.
    async fn identity(&self) -> Result<Identity, GatewayError>;

    /// All ad accounts visible to the token, fully paginated.
    async fn ad_accounts(&self) -> Result<Vec<AdAccount>, GatewayError>;

    /// One combined batch call for the account's campaigns, ad sets (with
    /// nested ads), ads, and insights for `date`.
    async fn account_bundle(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<AccountBundle, GatewayError>;

    /// Flip an entity's run state. The id may name a campaign or an ad set.
    async fn set_status(&self, entity_id: &str, status: RunStatus) -> Result<(), GatewayError>;
}
