//! forkmirror runner entry point.
//!
//! Loads configuration, parses one pull-request event payload, runs the
//! mirror pipeline to completion, and exits. The trigger mechanism (workflow
//! runner, webhook relay) is responsible for invoking this binary once per
//! event with the payload written to a file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forkmirror_core::config::AppConfig;
use forkmirror_core::event::ForkPrEvent;
use forkmirror_core::git::GitClient;
use forkmirror_core::pipeline::MirrorPipeline;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Mirrors fork pull requests into a trusted upstream repository.
#[derive(Parser, Debug)]
#[command(
    name = "forkmirror",
    version,
    about = "Mirrors fork pull requests into a trusted upstream repository"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the pull_request event payload (JSON).
    #[arg(short, long)]
    event: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and resolve configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables in config")?;
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.runner.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  forkmirror v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Upstream repo : {}", config.github.repo);
    info!("Trunk branch  : {}", config.github.trunk_branch);
    info!("Event payload : {}", args.event.display());
    info!("Data dir      : {}", config.runner.data_dir.display());
    info!("Log level     : {}", log_level);
    info!("========================================");

    if config.github.token.is_none() {
        bail!(
            "GitHub token not resolved; set the '{}' environment variable",
            config.github.token_env
        );
    }

    // Parse the event payload, filtering non-fork and irrelevant events.
    let payload =
        std::fs::read_to_string(&args.event).context("failed to read event payload file")?;
    let event = match ForkPrEvent::from_json(&payload).context("failed to parse event payload")? {
        Some(event) => event,
        None => {
            info!("event is not a fork PR open/synchronize, nothing to do");
            return Ok(());
        }
    };

    // Set up the scratch git workspace.
    std::fs::create_dir_all(&config.runner.data_dir)
        .context("failed to create data directory")?;
    let scratch_path = config.runner.data_dir.join("workspace");
    let git = GitClient::init_scratch(&scratch_path)
        .context("failed to initialize scratch git workspace")?;
    info!("Scratch workspace at {}", scratch_path.display());

    // Run the pipeline once, end to end.
    let pipeline =
        MirrorPipeline::new(config, git).context("failed to initialize mirror pipeline")?;
    let outcome = pipeline
        .run(&event)
        .await
        .context("mirror pipeline failed")?;

    info!(
        fork_pr = event.pr_number,
        branch = %event.head_branch,
        outcome = %outcome,
        "event processed"
    );
    Ok(())
}
