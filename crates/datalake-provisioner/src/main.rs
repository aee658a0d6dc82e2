//! datalake: provision and catalog an S3 + Glue data lake
//!
//! Every command is safe to run again: existing resources are left as they
//! are and only missing ones are created.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use datalake_common::defaults::{
    DEFAULT_CRAWLER, DEFAULT_DATABASE, DEFAULT_DATABASE_DESCRIPTION, DEFAULT_DOMAIN,
    DEFAULT_ENTITIES, DEFAULT_MANAGED_POLICIES, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_REGION, DEFAULT_ROLE_NAME, DEFAULT_ROLE_PROPAGATION_SECS,
    DEFAULT_WATCH_TIMEOUT_SECS,
};
use datalake_provisioner::aws::{AwsContext, AwsResources, FromAwsContext};
use datalake_provisioner::config::{AwsConfig, CatalogConfig, CatalogZone, Config, LakeConfig};
use datalake_provisioner::pipeline::{LogReporter, Pipeline, PipelineResult, StepOutcome};
use datalake_provisioner::{PollConfig, lake, lifecycle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "datalake")]
#[command(about = "Idempotent provisioning of an S3 + Glue data lake")]
#[command(version)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Settings shared by every command
#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides default credential resolution)
    #[arg(long, global = true, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// Lake bucket name
    #[arg(long, global = true, env = "S3_BUCKET_NAME")]
    bucket: Option<String>,

    /// Data domain, second segment of every key
    #[arg(long, global = true, env = "DATALAKE_DOMAIN", default_value = DEFAULT_DOMAIN)]
    domain: String,

    /// Comma-separated entities of the domain (default: the finance entities)
    #[arg(long, global = true, env = "DATALAKE_ENTITIES")]
    entities: Option<String>,

    /// Local directory holding raw/ and processed/
    #[arg(long, global = true, env = "DATALAKE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Glue database name
    #[arg(long, global = true, env = "GLUE_DATABASE_NAME", default_value = DEFAULT_DATABASE)]
    database: String,

    /// Glue crawler name of the raw zone
    #[arg(long, global = true, env = "GLUE_CRAWLER_NAME", default_value = DEFAULT_CRAWLER)]
    crawler: String,

    /// IAM role the crawler runs as
    #[arg(long, global = true, env = "GLUE_ROLE_NAME", default_value = DEFAULT_ROLE_NAME)]
    role: String,

    /// Crawler polling budget in seconds (default: 180 for catalog, 300 for watch)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Seconds between crawler status checks
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Seconds to wait after creating the role before using it (0 disables)
    #[arg(long, global = true, default_value_t = DEFAULT_ROLE_PROPAGATION_SECS)]
    role_propagation: u64,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

impl GlobalArgs {
    fn parse_entities(&self) -> Vec<String> {
        match &self.entities {
            Some(entities) => entities
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_ENTITIES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Polling budget, `--timeout` overriding the command's default
    fn poll_config(&self, default_timeout_secs: u64) -> PollConfig {
        PollConfig {
            timeout: Duration::from_secs(self.timeout.unwrap_or(default_timeout_secs)),
            interval: Duration::from_secs(self.interval),
        }
    }
}

impl From<&GlobalArgs> for Config {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            aws: AwsConfig {
                region: args.region.clone(),
                profile: args.aws_profile.clone(),
            },
            lake: LakeConfig {
                bucket: args.bucket.clone(),
                domain: args.domain.clone(),
                entities: args.parse_entities(),
                data_dir: args.data_dir.clone(),
            },
            catalog: CatalogConfig {
                database: args.database.clone(),
                database_description: DEFAULT_DATABASE_DESCRIPTION.to_string(),
                crawler: args.crawler.clone(),
                role_name: args.role.clone(),
                managed_policies: DEFAULT_MANAGED_POLICIES.iter().map(|s| s.to_string()).collect(),
                role_propagation: Duration::from_secs(args.role_propagation),
            },
            poll: args.poll_config(DEFAULT_POLL_TIMEOUT_SECS),
            watch_poll: args.poll_config(DEFAULT_WATCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the lake bucket and its folder structure
    SetupBucket,

    /// Upload local files under their partition keys
    Upload {
        /// Zone to upload
        #[arg(long, value_enum, default_value = "raw")]
        zone: CatalogZone,

        /// Partition date of raw files (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show file counts per zone and entity
    Verify,

    /// Ensure database, role and crawler, then run the crawler
    Catalog {
        /// Zone to catalog
        #[arg(long, value_enum, default_value = "raw")]
        zone: CatalogZone,
    },

    /// Wait for a crawler that is already running, without starting it
    Watch {
        /// Zone whose crawler to watch
        #[arg(long, value_enum, default_value = "raw")]
        zone: CatalogZone,
    },

    /// Install the lake lifecycle rules on the bucket
    Lifecycle {
        /// Validate and print the rules without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    // Print main error message
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    // Print error chain (causes)
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    // Known AWS errors come with a fix
    let hint = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<datalake_provisioner::aws::AwsError>())
        .and_then(|aws| aws.suggestion());
    if let Some(hint) = hint {
        let _ = writeln!(stderr, "  \x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into())
        // Reduce noise from the AWS SDK (show only warnings and errors)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("aws_sdk_s3=warn".parse()?)
        .add_directive("aws_sdk_glue=warn".parse()?)
        .add_directive("aws_sdk_iam=warn".parse()?);

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Cancellation token tripped by Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping the local wait");
            trigger.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<()> {
    // A missing .env file is fine; the environment and flags still apply
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing()?;

    let json = args.global.json;
    let config = Config::from(&args.global);

    let aws = AwsContext::with_profile(&config.aws.region, config.aws.profile.as_deref()).await;
    if let Some(profile) = &config.aws.profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let resources = AwsResources::from_context(&aws);

    match args.command {
        Command::SetupBucket => handle_setup_bucket(&config, &resources, json).await,
        Command::Upload { zone, date } => handle_upload(&config, &resources, zone, date, json).await,
        Command::Verify => handle_verify(&config, &resources, json).await,
        Command::Catalog { zone } => handle_catalog(&config, &resources, zone, json).await,
        Command::Watch { zone } => handle_watch(&config, &resources, zone, json).await,
        Command::Lifecycle { dry_run } => handle_lifecycle(&config, &resources, dry_run, json).await,
    }
}

async fn handle_setup_bucket(config: &Config, resources: &AwsResources, json: bool) -> Result<()> {
    let setup = lake::setup_bucket(resources, &config.lake).await?;

    if json {
        return print_json(&setup);
    }
    let state = if setup.bucket.existed_before() {
        "already existed"
    } else {
        "created"
    };
    println!("Bucket s3://{}/ {state}", setup.bucket.spec().name());
    println!("{} folder markers in place", setup.folders);
    Ok(())
}

async fn handle_upload(
    config: &Config,
    resources: &AwsResources,
    zone: CatalogZone,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let bucket = config.lake.bucket()?;
    let destination = config.lake.stage_uri(zone.stage())?;
    let dir = config.lake.local_dir(zone.stage());
    let uploads = match zone {
        CatalogZone::Raw => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            lake::collect_raw_uploads(&dir, &config.lake.domain, date)?
        }
        CatalogZone::Processed => lake::collect_processed_uploads(&dir, &config.lake.domain)?,
    };
    if uploads.is_empty() {
        anyhow::bail!(
            "No {zone} files for domain '{}' found in {}",
            config.lake.domain,
            dir.display()
        );
    }

    info!(files = uploads.len(), destination = %destination, "Uploading");
    let summary = lake::upload_all(resources.s3(), bucket, &uploads).await;

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Uploaded {}/{} files to {destination}",
            summary.uploaded.len(),
            summary.total(),
        );
        println!("Entities: {}", summary.entities().join(", "));
        for (key, error) in &summary.failed {
            println!("  failed: {key}: {error}");
        }
    }

    if !summary.is_complete() {
        anyhow::bail!("{} of {} uploads failed", summary.failed.len(), summary.total());
    }
    Ok(())
}

async fn handle_verify(config: &Config, resources: &AwsResources, json: bool) -> Result<()> {
    let zones = lake::verify(resources.s3(), &config.lake).await?;

    if json {
        return print_json(&zones);
    }
    println!("Data lake s3://{}/", config.lake.bucket()?);
    for zone in &zones {
        println!("\n{}", zone.prefix);
        println!("  files: {}", zone.files);
        for (entity, count) in &zone.by_entity {
            println!("  - {entity}: {count} file(s)");
        }
    }
    Ok(())
}

async fn handle_catalog(
    config: &Config,
    resources: &AwsResources,
    zone: CatalogZone,
    json: bool,
) -> Result<()> {
    let spec = config.pipeline_spec(zone)?;
    info!(
        zone = %zone,
        database = %spec.database.name(),
        crawler = %spec.crawler.name,
        source = %spec.crawler.source_path,
        "Cataloging zone"
    );

    let reporter = LogReporter::new();
    let result = Pipeline::new(resources, &reporter)
        .with_cancellation(ctrl_c_token())
        .provision(&spec)
        .await;

    report_pipeline(&result, json)
}

async fn handle_watch(
    config: &Config,
    resources: &AwsResources,
    zone: CatalogZone,
    json: bool,
) -> Result<()> {
    let crawler = config.crawler_name(zone);
    info!(
        crawler = %crawler,
        timeout_secs = config.watch_poll.timeout.as_secs(),
        "Watching crawler"
    );

    let reporter = LogReporter::new();
    let result = Pipeline::new(resources, &reporter)
        .with_cancellation(ctrl_c_token())
        .watch(&crawler, config.watch_poll)
        .await;

    report_pipeline(&result, json)
}

fn report_pipeline(result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        print_json(result)?;
    } else {
        for report in &result.steps {
            let outcome = match &report.outcome {
                StepOutcome::NoOp => "already exists".to_string(),
                StepOutcome::Created => "created".to_string(),
                StepOutcome::Started => "started".to_string(),
                StepOutcome::AlreadyRunning => "already running".to_string(),
                StepOutcome::Finished(outcome) => format!("finished: {outcome}"),
                StepOutcome::Failed(message) => format!("FAILED: {message}"),
            };
            println!("{:<16} {:<32} {outcome}", report.step.as_ref(), report.resource);
            if let Some(hint) = &report.hint {
                println!("{:<16} hint: {hint}", "");
            }
        }
        if let Some(run) = &result.job {
            println!(
                "\n{}: {} polls, {}s of {}s budget",
                run.job_name(),
                run.polls(),
                run.elapsed().as_secs(),
                run.timeout().as_secs()
            );
        }
    }

    match (result.failed_step, result.job_outcome()) {
        _ if result.is_success() => Ok(()),
        (Some(step), _) => anyhow::bail!("Pipeline stopped at step '{step}'"),
        (None, Some(outcome)) => anyhow::bail!("Crawler finished with outcome {outcome}"),
        (None, None) => anyhow::bail!("Pipeline did not run the crawler"),
    }
}

async fn handle_lifecycle(
    config: &Config,
    resources: &AwsResources,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let bucket = config.lake.bucket()?;
    let rules = lifecycle::default_rules();

    if dry_run {
        lifecycle::validate(&rules).context("Invalid lifecycle rules")?;
    } else {
        lake::apply_lifecycle(resources.s3(), bucket, &rules).await?;
    }

    if json {
        return print_json(&rules);
    }
    let verb = if dry_run { "Would apply" } else { "Applied" };
    println!("{verb} {} lifecycle rules to s3://{bucket}/", rules.len());
    for rule in &rules {
        let action = match (rule.transition, rule.expiration_days) {
            (Some(t), _) => format!("{} after {} days", t.storage_class, t.days),
            (None, Some(days)) => format!("expire after {days} days"),
            (None, None) => "no action".to_string(),
        };
        println!("  {:<28} {:<20} {action}", rule.id, rule.prefix);
    }
    Ok(())
}
