//! CLI argument definitions for the `sluice` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Standalone syslog relay.
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
pub struct SluiceCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a configuration, build the pipeline, and run it until shutdown.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the relay's YAML configuration file.
    #[arg(short, long, default_value = "/etc/sluice/sluice.yaml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over `RUST_LOG` and the config file.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long, default_value = "json")]
    pub log_format: String,

    /// Validate the configuration and exit without starting any I/O.
    #[arg(long)]
    pub validate: bool,
}
