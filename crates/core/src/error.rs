use serde::Serialize;
use thiserror::Error;

pub type AutoAdsResult<T> = Result<T, AutoAdsError>;

#[derive(Error, Debug)]
pub enum AutoAdsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schedule validation error: {0}")]
    Validation(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Classified failure from the ad-platform API.
///
/// The classification decides how a caller reacts: `Transient` and
/// `RateLimited` are retryable for the single call, `InvalidToken` and
/// `PermissionDenied` abort the whole run, and `Resource` is fatal for the
/// one entity it names while sibling entities continue.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayError {
    #[error("transient error: {message}")]
    Transient { message: String },

    #[error("rate limited by the platform")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("invalid access token: {message}")]
    InvalidToken { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("resource error (code {code}): {message}")]
    Resource { code: i64, message: String },
}

impl GatewayError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether the same call may be retried after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Whether the failure invalidates the whole run rather than one entity.
    /// A bad token cannot be fixed mid-run.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::PermissionDenied { .. }
        )
    }
}
