//! Campaign-name matching strategies for schedule scoping.
//!
//! The matching behavior is deliberately configurable: some flows match the
//! raw campaign name case-sensitively, others normalize both sides first.
//! Unifying them silently would change which campaigns a schedule touches.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Substring match on the raw campaign name.
    #[default]
    CaseSensitive,
    /// Substring match ignoring ASCII case.
    CaseInsensitive,
    /// Both sides lowercased with non-alphanumerics collapsed to single
    /// spaces before the containment check.
    Normalized,
}

impl MatchStrategy {
    /// Whether `campaign_name` matches the schedule's `key` under this
    /// strategy. An empty key never matches.
    pub fn matches(self, campaign_name: &str, key: &str) -> bool {
        if key.trim().is_empty() {
            return false;
        }
        match self {
            Self::CaseSensitive => campaign_name.contains(key),
            Self::CaseInsensitive => campaign_name
                .to_ascii_lowercase()
                .contains(&key.to_ascii_lowercase()),
            Self::Normalized => normalize(campaign_name).contains(&normalize(key)),
        }
    }
}

/// Lowercase, replace non-alphanumeric runs with single spaces, trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}
