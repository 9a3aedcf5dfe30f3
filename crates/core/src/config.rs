use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with
/// the prefix `AUTOADS__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Ad-platform REST API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Fixed upper bound on every single HTTP call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Concurrency bound for per-account fetches. The platform rate-limits
    /// in aggregate, so unbounded fan-out cascades into rate-limit errors.
    #[serde(default = "default_account_batch_size")]
    pub account_batch_size: usize,
    /// Whole-run deadline; expiry yields a partial report, not a hang.
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Lease TTL guards forward progress if a holder crashes mid-run.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// How long a dispatcher waits on a run before treating it as unknown.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_api_version() -> String {
    "v22.0".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_page_size() -> u32 {
    500
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_account_batch_size() -> usize {
    5
}
fn default_run_deadline_secs() -> u64 {
    300
}
fn default_lease_ttl_secs() -> u64 {
    300
}
fn default_dispatch_timeout_secs() -> u64 {
    300
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            page_size: default_page_size(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            account_batch_size: default_account_batch_size(),
            run_deadline_secs: default_run_deadline_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("AUTOADS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Fully-qualified Graph API root, e.g. `https://graph.facebook.com/v22.0`.
    pub fn graph_root(&self) -> String {
        format!("{}/{}", self.graph.base_url, self.graph.api_version)
    }
}
