//! flowhouse-migrate CLI - bring a ClickHouse flow schema to the current version.

use clap::Parser;
use flowhouse_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "flowhouse-migrate")]
#[command(about = "ClickHouse schema migration for the flow pipeline")]
#[command(version)]
struct Cli {
    /// Path to YAML or JSON configuration file
    #[arg(short, long, default_value = "flowhouse.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel = setup_signal_handler()?;

    let orchestrator = Orchestrator::new(config)?;
    let result = orchestrator.run(cancel).await?;

    info!(
        "schema ready: {} of {} steps applied in {:.1}s",
        result.steps_applied, result.steps_total, result.duration_seconds
    );
    if cli.output_json {
        println!("{}", result.to_json()?);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity));
    match format {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Cancel the migration on SIGINT or SIGTERM. The engine finishes the DDL
/// statement in flight and aborts cleanly; the next run resumes from the
/// first still-unapplied step.
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    #[cfg(unix)]
    {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {},
                _ = sigterm.recv() => {},
            }
            warn!("shutdown signal received, cancelling migration");
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown signal received, cancelling migration");
            token.cancel();
        }
    });

    Ok(cancel)
}
