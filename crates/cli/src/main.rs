//! CLI binary summarising fleet power states per owner tag.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use fleet_inventory_azure::{AzureCompute, AzureConfig};
use fleet_inventory_mock::MockInventory;
use fleet_pipeline::{DEFAULT_WORKERS, MergePolicy, PipelineConfig, RunReport, run_pipeline};
use fleet_report::{Report, ReportSink, SlackWebhookSink, StdoutSink};
use tracing::{error, info, warn};
use url::Url;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Azure client error
    #[error(transparent)]
    Azure(#[from] fleet_inventory_azure::Error),

    /// Missing or invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// Fixture loading error
    #[error("fixture error: {0}")]
    Fixture(#[from] fleet_inventory_mock::Error),

    /// Pipeline error
    #[error(transparent)]
    Pipeline(#[from] fleet_pipeline::Error),

    /// Report delivery error
    #[error("failed to deliver report: {0}")]
    Sink(#[from] fleet_report::Error),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum Policy {
    /// Latest status time wins
    #[default]
    MostRecent,

    /// Last completed fetch wins
    LastProcessed,
}

impl From<Policy> for MergePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::MostRecent => Self::MostRecent,
            Policy::LastProcessed => Self::LastProcessed,
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Azure access token for the management API
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Seconds after which pending fetches are abandoned
    #[arg(long, env = "FLEET_DEADLINE_SECS")]
    deadline_secs: Option<u64>,

    /// Print the report instead of posting it
    #[arg(long, env = "FLEET_DRY_RUN")]
    dry_run: bool,

    /// Seconds after which a single fetch is abandoned
    #[arg(long, env = "FLEET_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: Option<u64>,

    /// JSON file of instance details to report on instead of Azure
    #[arg(long, env = "FLEET_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Tag whose value groups instances into one row
    #[arg(long, env = "AZURE_GROUP_BY_PREFIX")]
    group_by: String,

    /// Azure management endpoint
    #[arg(
        long,
        default_value = "https://management.azure.com",
        env = "AZURE_MANAGEMENT_ENDPOINT"
    )]
    management_endpoint: Url,

    /// How each group's power state and times are chosen
    #[arg(long, value_enum, default_value_t = Policy::MostRecent, env = "FLEET_MERGE_POLICY")]
    merge_policy: Policy,

    /// Resource group the virtual machines live in
    #[arg(long, env = "AZURE_RESOURCE_GROUP_NAME")]
    resource_group: Option<String>,

    /// Slack incoming webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<Url>,

    /// Azure subscription ID
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription_id: Option<String>,

    /// Maximum number of concurrent detail fetches
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "FLEET_WORKERS")]
    workers: NonZeroUsize,
}

fn pipeline_config(args: &Args) -> PipelineConfig {
    let mut config = PipelineConfig::new(args.group_by.clone())
        .with_workers(args.workers)
        .with_merge_policy(args.merge_policy.into());

    if let Some(secs) = args.fetch_timeout_secs {
        config = config.with_fetch_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.deadline_secs {
        config = config.with_deadline(Duration::from_secs(secs));
    }

    config
}

fn azure_config(args: &Args) -> Result<AzureConfig, Error> {
    let required = |value: &Option<String>, flag: &str| {
        value
            .clone()
            .ok_or_else(|| Error::Config(format!("--{flag} is required without --fixture")))
    };

    let mut config = AzureConfig::new(
        required(&args.subscription_id, "subscription-id")?,
        required(&args.resource_group, "resource-group")?,
        required(&args.access_token, "access-token")?,
    )?;
    config.management_endpoint = args.management_endpoint.clone();

    Ok(config)
}

async fn collect(args: &Args) -> Result<RunReport, Error> {
    let config = pipeline_config(args);

    let run = if let Some(fixture) = &args.fixture {
        info!("reporting on fixture {}", fixture.display());

        let inventory = MockInventory::from_fixture_file(fixture)?;
        run_pipeline(&inventory, &inventory, &config).await?
    } else {
        let compute = AzureCompute::new(azure_config(args)?);
        run_pipeline(&compute, &compute, &config).await?
    };

    Ok(run)
}

fn sink(args: &Args) -> Box<dyn ReportSink> {
    match (&args.slack_webhook_url, args.dry_run) {
        (Some(url), false) => Box::new(SlackWebhookSink::new(url.clone())),
        (None, false) => {
            warn!("no slack webhook configured, printing report");
            Box::new(StdoutSink)
        }
        (_, true) => Box::new(StdoutSink),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let run = collect(&args).await?;

    for summary in run.summaries.values() {
        info!(
            key = %summary.key,
            power_state = %summary.power_state,
            allocated = summary.allocated,
            "group summary"
        );
    }

    let report = Report::from_run(&run);
    if let Err(e) = sink(&args).deliver(&report).await {
        error!("{e}");
        return Err(e.into());
    }

    Ok(())
}
