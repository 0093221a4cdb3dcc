//! Netcap - follower network analytics for Farcaster
//!
//! A CLI tool that pages through an account's followers on the
//! Neynar API and reports how many followers those followers have.
//!
//! Exit codes:
//!   0 - Run succeeded
//!   1 - Runtime error (config, missing FID, failed or interrupted run)

mod aggregator;
mod cli;
mod client;
mod config;
mod models;
mod report;

use aggregator::{AggregationSession, FollowerAggregator};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use client::NeynarClient;
use config::Config;
use models::{AggregationState, Fid, NetworkReport};
use report::ProgressDisplay;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Netcap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", redacted(&args));

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\nError: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .netcap.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", config::CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Copy of the arguments safe to log.
fn redacted(args: &Args) -> Args {
    let mut shown = args.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("***".to_string());
    }
    shown
}

/// Resolve the subject, run the aggregation and emit the report. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let Some(fid) = Fid::resolve(args.fid, config.general.default_fid) else {
        anyhow::bail!(
            "No FID provided. Pass --fid, set NETCAP_FID, or set default_fid in {}",
            config::CONFIG_FILE_NAME
        );
    };

    let client = NeynarClient::new(config.neynar_config()?)
        .context("Failed to create HTTP client")?;
    let aggregator = FollowerAggregator::new(Arc::new(client), config.aggregator_config());
    debug!(
        "Page size {}, inter-page delay {:?}",
        aggregator.config().page_size,
        aggregator.config().inter_page_delay
    );

    let mut session = AggregationSession::new(aggregator);
    let mut handle = session.start(fid);
    let progress = ProgressDisplay::new(!args.quiet);

    let mut outcome: Option<AggregationState> = None;
    loop {
        tokio::select! {
            state = handle.next_state() => match state {
                Some(state) => {
                    progress.update(&state);
                    if state.is_terminal() {
                        outcome = Some(state);
                    }
                }
                None => break,
            },
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling run for FID {}", fid);
                session.cancel();
            }
        }
    }
    progress.clear();

    let Some(outcome) = outcome else {
        eprintln!("Run for FID {} was cancelled.", fid);
        return Ok(1);
    };

    let succeeded = matches!(outcome, AggregationState::Succeeded { .. });
    let report = NetworkReport {
        fid,
        outcome,
        generated_at: Utc::now(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Text => report::generate_text_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => {
            print!("{}", output);
            std::io::stdout().flush()?;
        }
    }

    Ok(if succeeded { 0 } else { 1 })
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_from_dir(std::path::Path::new(".")) {
        Ok(Some(config)) => {
            info!("Loaded config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
