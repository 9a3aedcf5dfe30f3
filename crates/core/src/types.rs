use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::{AutoAdsError, GatewayError};
use crate::matching::MatchStrategy;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Run state accepted by the platform's status-mutation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Active,
    Paused,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Campaign/ad-set run status as reported by the platform. Unknown values
/// are tolerated rather than rejected at the deserialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Paused,
    Deleted,
    Archived,
    #[serde(other)]
    #[default]
    Unknown,
}

impl CampaignStatus {
    /// Whether this status already equals the requested run state.
    pub fn matches(self, target: RunStatus) -> bool {
        matches!(
            (self, target),
            (Self::Active, RunStatus::Active) | (Self::Paused, RunStatus::Paused)
        )
    }
}

impl From<RunStatus> for CampaignStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Active => Self::Active,
            RunStatus::Paused => Self::Paused,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Deleted => "DELETED",
            Self::Archived => "ARCHIVED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Fine-grained per-ad delivery state, beyond simple ACTIVE/PAUSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectiveStatus {
    Active,
    Paused,
    AdsetPaused,
    CampaignPaused,
    Disapproved,
    PendingReview,
    Preapproved,
    PendingBillingInfo,
    WithIssues,
    #[serde(other)]
    Unknown,
}

impl EffectiveStatus {
    /// Statuses that indicate the ad is prevented from serving by review,
    /// billing, or a paused parent.
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::AdsetPaused
                | Self::Disapproved
                | Self::PendingReview
                | Self::Preapproved
                | Self::PendingBillingInfo
                | Self::WithIssues
        )
    }
}

/// Derived classification of whether a campaign's ads are actually serving,
/// distinct from the raw run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Active,
    Inactive,
    NotDelivering,
    RecentlyRejected,
}

// ---------------------------------------------------------------------------
// Platform entities (constructed once at the gateway boundary)
// ---------------------------------------------------------------------------

/// Authenticated platform identity, resolved once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl AdAccount {
    /// Account ids arrive with an `act_` prefix on listing endpoints.
    pub fn bare_id(&self) -> &str {
        self.id.strip_prefix("act_").unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    /// Minor currency units; the platform serializes these as strings.
    #[serde(default, deserialize_with = "minor_units")]
    pub daily_budget: Option<i64>,
    #[serde(default, deserialize_with = "minor_units")]
    pub budget_remaining: Option<i64>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// Nested ads connection when requested as `ads{...}` in the field list.
    #[serde(default)]
    pub ads: Option<Page<Ad>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "unknown_effective_status")]
    pub effective_status: EffectiveStatus,
    #[serde(default)]
    pub adset_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

fn unknown_effective_status() -> EffectiveStatus {
    EffectiveStatus::Unknown
}

/// One campaign-level insight row for the requested date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignInsight {
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// Decimal string on the wire ("123.45").
    #[serde(default, deserialize_with = "decimal_string")]
    pub spend: f64,
    #[serde(default, deserialize_with = "opt_decimal_string")]
    pub cost_per_result: Option<f64>,
}

// ---------------------------------------------------------------------------
// Pagination envelope
// ---------------------------------------------------------------------------

/// One page of a paginated platform listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl<T> Page<T> {
    /// The opaque URL of the next page, if any.
    pub fn next(&self) -> Option<&str> {
        self.paging.as_ref().and_then(|p| p.next.as_deref())
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            paging: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Per-ad-set slice of a campaign snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSetSnapshot {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub cpp: Option<f64>,
    pub ad_statuses: Vec<EffectiveStatus>,
}

/// Per-campaign aggregate produced fresh on every aggregation run.
/// Never mutated in place; each run replaces the previous snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    /// Major currency units from here on.
    pub daily_budget: f64,
    pub budget_remaining: f64,
    /// daily_budget − budget_remaining, rounded to 2 decimals. Only a valid
    /// proxy for campaigns on a daily budget; 0 when no daily budget is set.
    pub estimated_spent: f64,
    /// Spend reported by the insights edge for today (0 if absent).
    pub insights_spend: f64,
    pub spend_difference: f64,
    pub cpp: Option<f64>,
    pub delivery: DeliveryStatus,
    pub adsets: BTreeMap<String, AdSetSnapshot>,
    /// Multiset of effective statuses observed across the campaign's ads.
    pub ad_statuses: Vec<EffectiveStatus>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SpendTotals {
    pub daily_budget: f64,
    pub budget_remaining: f64,
    pub spent: f64,
}

impl SpendTotals {
    pub fn accumulate(&mut self, other: &SpendTotals) {
        self.daily_budget += other.daily_budget;
        self.budget_remaining += other.budget_remaining;
        self.spent += other.spent;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub account_name: String,
    pub campaigns: BTreeMap<String, CampaignSnapshot>,
    pub totals: SpendTotals,
    pub fetched_at: DateTime<Utc>,
}

/// Best-effort aggregation result: snapshots for the accounts that
/// succeeded plus an error manifest for the ones that did not.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub identity: Identity,
    pub accounts: BTreeMap<String, AccountSnapshot>,
    pub errors: BTreeMap<String, GatewayError>,
    pub totals: SpendTotals,
    /// False when the run deadline expired before every account was fetched.
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Schedule spec
// ---------------------------------------------------------------------------

/// Which entity level a schedule operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleScope {
    Campaigns,
    AdSets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Turn the entity on when the metric is below the threshold.
    On,
    /// Turn the entity off when the metric is at or above the threshold.
    Off,
}

/// Requested automation intent for one scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    #[serde(alias = "watch")]
    pub scope: ScheduleScope,
    /// Campaign-name component to match, e.g. a product code.
    #[serde(alias = "campaign_code")]
    pub match_key: String,
    /// CPP threshold the metric is compared against.
    #[serde(alias = "cpp_metric")]
    pub threshold: f64,
    #[serde(alias = "on_off")]
    pub direction: Direction,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
    #[serde(default)]
    pub matching: MatchStrategy,
}

impl ScheduleSpec {
    /// Reject malformed specs before any network call is made.
    pub fn validate(&self) -> Result<(), AutoAdsError> {
        if self.match_key.trim().is_empty() {
            return Err(AutoAdsError::Validation("match_key must not be empty".into()));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(AutoAdsError::Validation(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        if let (Some(start), Some(end)) = (self.date_start, self.date_end) {
            if end < start {
                return Err(AutoAdsError::Validation(format!(
                    "date_end {end} precedes date_start {start}"
                )));
            }
        }
        Ok(())
    }

    /// Whether the schedule is active on the given date. An absent bound is
    /// open on that side.
    pub fn in_window(&self, today: NaiveDate) -> bool {
        if let Some(start) = self.date_start {
            if today < start {
                return false;
            }
        }
        if let Some(end) = self.date_end {
            if today > end {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Schedule record (persisted between runs)
// ---------------------------------------------------------------------------

/// Cached view of one matched entity from the previous run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntity {
    pub name: String,
    pub status: CampaignStatus,
    pub cpp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Success,
    Failed,
}

/// Last-known matched-entity map for an account, persisted so repeated runs
/// do not always refetch from scratch. Read and written only under the
/// run's lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignScheduleRecord {
    pub account_id: String,
    #[serde(default)]
    pub matched: BTreeMap<String, CachedEntity>,
    #[serde(default)]
    pub last_time_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_check_status: Option<CheckStatus>,
    #[serde(default)]
    pub last_check_message: Option<String>,
}

impl CampaignScheduleRecord {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            matched: BTreeMap::new(),
            last_time_checked: None,
            last_check_status: None,
            last_check_message: None,
        }
    }
}

/// One progress line for the live-status viewer. Write-only from the
/// engine's perspective; the channel keeps only the latest value per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub recipient: String,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Money helpers
// ---------------------------------------------------------------------------

/// Convert minor currency units to major units (divide by 100).
pub fn minor_to_major(minor: Option<i64>) -> f64 {
    minor.unwrap_or(0) as f64 / 100.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Budget fields arrive as either JSON integers or digit strings.
fn minor_units<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn decimal_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_decimal_string(deserializer)?.unwrap_or(0.0))
}

fn opt_decimal_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(v)) => Ok(Some(v)),
        Some(Raw::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
