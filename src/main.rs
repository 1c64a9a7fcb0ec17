use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notice_watch::config::Config;
use notice_watch::cycle::PollCycle;
use notice_watch::error::Error;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "notice-watch.toml";

#[derive(Parser)]
#[command(
    name = "notice-watch",
    version,
    about = "Polls a property notice board and mails out new notices",
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long)]
    log_format: Option<String>,

    /// Fetch and extract only; send no mail and keep the watermark
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.exists().then(|| default.to_path_buf())
    });
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    tracing::info!(
        config = ?config_path,
        list_url = %config.source.list_url,
        cell_id = %config.source.cell_id,
        "Starting notice-watch"
    );

    let cycle = PollCycle::from_config(config)
        .map_err(|e| fatal(e, "Failed to set up poll cycle"))?
        .with_dry_run(cli.dry_run);

    let summary = cycle
        .run()
        .await
        .map_err(|e| fatal(e, "Poll cycle failed"))?;

    if summary.is_idle() {
        tracing::info!("Nothing new on the board");
    } else {
        tracing::info!(
            new = summary.candidates,
            sent = summary.count("sent"),
            "notice-watch completed successfully"
        );
    }

    Ok(())
}

/// Log a run-ending error with its category before handing it to anyhow
fn fatal(err: Error, context: &'static str) -> anyhow::Error {
    tracing::error!(
        category = %err.category(),
        retry_next_run = err.is_recoverable(),
        error = %err,
        "{context}"
    );
    anyhow::Error::new(err).context(context)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("notice_watch=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("notice_watch={level},warn"))
            .with_context(|| format!("Invalid log level: {level}"))?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
