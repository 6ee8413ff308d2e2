//! E-commerce extraction CLI.
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline once against the configured warehouse
//! ecom-extract run
//!
//! # Reproducible run into an in-memory warehouse, summary as JSON
//! ecom-extract run --seed 42 --dry-run --json
//!
//! # Show the task graph
//! ecom-extract graph
//!
//! # Validate configuration and warehouse connectivity
//! ecom-extract check
//! ```
//!
//! # Commands
//!
//! - `run` - Run every task once; exits 1 when a required task fails
//! - `graph` - Print tasks in execution order with their dependencies
//! - `check` - Validate configuration and ping the warehouse

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use ecom_extract_pipeline::PipelineConfig;
use ecom_extract_pipeline::config::LogFormat;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ecom-extract")]
#[command(author, version, about = "E-commerce data extraction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction pipeline once
    Run {
        /// Seed for order date and status assignment (overrides `ORDER_SEED`)
        #[arg(long)]
        seed: Option<u64>,

        /// Load into an in-memory warehouse instead of `PostgreSQL`
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the task graph in execution order
    Graph,
    /// Validate configuration and warehouse connectivity
    Check,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &PipelineConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ecom_extract_pipeline=info,ecom_extract_cli=info".into());

    let json = format == LogFormat::Json;
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Text);
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            seed,
            dry_run,
            json,
        } => commands::run::execute(config, seed, dry_run, json).await?,
        Commands::Graph => commands::graph::print(&config).await?,
        Commands::Check => commands::check::execute(&config).await?,
    }
    Ok(())
}
