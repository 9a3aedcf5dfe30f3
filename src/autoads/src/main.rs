//! AutoAds — scheduled automation engine for ad campaign lifecycle control.
//!
//! Entry point for the job dispatcher: each subcommand is one automation
//! flavor, invoked with a caller-side wait timeout before the run is
//! treated as failed/unknown.

use autoads_aggregator::SpendAggregator;
use autoads_cache::{
    LeaseService, LocalLeaseService, LocalProgressChannel, LocalScheduleStore, ProgressChannel,
    RedisLeaseService, RedisProgressChannel, RedisScheduleStore, ScheduleStore,
};
use autoads_core::config::AppConfig;
use autoads_core::matching::MatchStrategy;
use autoads_core::types::{Direction, ScheduleScope, ScheduleSpec};
use autoads_engine::{verify_schedule_access, AutomationEngine};
use autoads_gateway::{GraphApi, GraphClient};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "autoads")]
#[command(about = "Scheduled automation engine for ad campaign lifecycle control")]
#[command(version)]
struct Cli {
    /// Platform access token
    #[arg(long, env = "AUTOADS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Progress-channel recipient key
    #[arg(long, env = "AUTOADS_USER_KEY", default_value = "autoads")]
    user_key: String,

    /// Use in-memory lease/progress/store instead of Redis (dry runs)
    #[arg(long, default_value_t = false)]
    local: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a campaign schedule against one ad account
    RunCampaigns {
        #[arg(long)]
        account_id: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Evaluate an ad-set schedule against one ad account
    RunAdsets {
        #[arg(long)]
        account_id: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// One-shot spend report across every account visible to the token
    AdSpend,
    /// Verify the token owns the given ad accounts
    Verify {
        #[arg(long, value_delimiter = ',')]
        account_ids: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    /// Campaign-name component to match (e.g. a product code)
    #[arg(long)]
    match_key: String,

    /// CPP threshold the metric is compared against
    #[arg(long)]
    threshold: f64,

    #[arg(long, value_enum)]
    direction: DirectionArg,

    #[arg(long)]
    date_start: Option<NaiveDate>,

    #[arg(long)]
    date_end: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = MatchingArg::CaseSensitive)]
    matching: MatchingArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    /// Turn on when the metric is below the threshold
    On,
    /// Turn off when the metric is at/above the threshold
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MatchingArg {
    CaseSensitive,
    CaseInsensitive,
    Normalized,
}

impl ScheduleArgs {
    fn into_spec(self, scope: ScheduleScope) -> ScheduleSpec {
        ScheduleSpec {
            scope,
            match_key: self.match_key,
            threshold: self.threshold,
            direction: match self.direction {
                DirectionArg::On => Direction::On,
                DirectionArg::Off => Direction::Off,
            },
            date_start: self.date_start,
            date_end: self.date_end,
            matching: match self.matching {
                MatchingArg::CaseSensitive => MatchStrategy::CaseSensitive,
                MatchingArg::CaseInsensitive => MatchStrategy::CaseInsensitive,
                MatchingArg::Normalized => MatchStrategy::Normalized,
            },
        }
    }
}

struct Services {
    leases: Arc<dyn LeaseService>,
    progress: Arc<dyn ProgressChannel>,
    store: Arc<dyn ScheduleStore>,
}

fn build_services(config: &AppConfig, local: bool) -> anyhow::Result<Services> {
    if local {
        info!("using in-memory services (no Redis)");
        return Ok(Services {
            leases: Arc::new(LocalLeaseService::new()),
            progress: Arc::new(LocalProgressChannel::new()),
            store: Arc::new(LocalScheduleStore::new()),
        });
    }

    info!(url = %config.redis.url, "using Redis-backed services");
    Ok(Services {
        leases: Arc::new(RedisLeaseService::new(&config.redis)?),
        progress: Arc::new(RedisProgressChannel::new(&config.redis)?),
        store: Arc::new(RedisScheduleStore::new(&config.redis)?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoads=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let api: Arc<dyn GraphApi> = Arc::new(GraphClient::new(&config.graph, cli.access_token)?);
    let services = build_services(&config, cli.local)?;
    let dispatch_timeout = Duration::from_secs(config.engine.dispatch_timeout_secs);
    let today = Local::now().date_naive();

    let engine = AutomationEngine::new(
        Arc::clone(&api),
        services.leases,
        services.store,
        Arc::clone(&services.progress),
        &config,
    );

    match cli.command {
        Command::RunCampaigns {
            account_id,
            schedule,
        } => {
            let spec = schedule.into_spec(ScheduleScope::Campaigns);
            let outcome = tokio::time::timeout(
                dispatch_timeout,
                engine.run_campaign_automation(&account_id, &cli.user_key, &spec),
            )
            .await
            .map_err(|_| anyhow::anyhow!("run timed out after {dispatch_timeout:?}"))??;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::RunAdsets {
            account_id,
            schedule,
        } => {
            let spec = schedule.into_spec(ScheduleScope::AdSets);
            let aggregator = SpendAggregator::new(
                Arc::clone(&api),
                Arc::clone(&services.progress),
                config.aggregator.clone(),
            );
            let outcome = tokio::time::timeout(dispatch_timeout, async {
                let snapshot = aggregator.aggregate_account(&account_id, today).await?;
                engine
                    .run_adset_automation(&account_id, &cli.user_key, &spec, &snapshot)
                    .await
            })
            .await
            .map_err(|_| anyhow::anyhow!("run timed out after {dispatch_timeout:?}"))??;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::AdSpend => {
            let aggregator = SpendAggregator::new(
                Arc::clone(&api),
                Arc::clone(&services.progress),
                config.aggregator.clone(),
            );
            let report = tokio::time::timeout(
                dispatch_timeout,
                aggregator.aggregate(&cli.user_key, today),
            )
            .await
            .map_err(|_| anyhow::anyhow!("aggregation timed out after {dispatch_timeout:?}"))??;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Verify { account_ids } => {
            let items = verify_schedule_access(api.as_ref(), &account_ids).await;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
