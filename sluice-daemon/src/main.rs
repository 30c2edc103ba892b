//! `sluice` -- standalone syslog relay daemon.
//!
//! # Usage
//!
//! ```text
//! sluice run --config /etc/sluice/sluice.yaml
//! sluice run --config ./sluice.yaml --validate
//! sluice run --log-level debug --log-format pretty
//! ```

mod cli;
mod logging;

use clap::Parser;
use sluice_relay::RunError;
use sluice_relay::pipeline::Pipeline;

use crate::cli::{Command, RunArgs, SluiceCli};

#[tokio::main]
async fn main() {
    let cli = SluiceCli::parse();
    let Command::Run(args) = cli.command;

    let exit_code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "sluice exiting with error");
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: RunArgs) -> Result<(), RunError> {
    let config = sluice_relay::config::load_from_path(&args.config).await?;

    if args.validate {
        // Tracing may not be initialized yet, so spin up a minimal
        // subscriber just for this.
        let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
        config.build()?;
        tracing::info!("configuration is valid");
        return Ok(());
    }

    let log_level = args.log_level.as_deref().unwrap_or("info");
    logging::init_tracing(log_level, &args.log_format)
        .map_err(RunError::Runtime)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %args.config.display(),
        "sluice starting"
    );

    let built = config.build()?;
    let pipeline = Pipeline::start(built)
        .await
        .map_err(|e| RunError::Runtime(e.into()))?;

    let signal = wait_for_shutdown_signal()
        .await
        .map_err(RunError::Runtime)?;
    tracing::info!(signal, "shutdown signal received");

    pipeline.shutdown().await;
    tracing::info!("sluice shut down cleanly");

    Ok(())
}

/// Waits for SIGTERM or SIGINT, returning the name of whichever fired first.
async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}
