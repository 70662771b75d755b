//! CLI for the carrier transfer-job controller.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use carrier_core::config;
use std::path::PathBuf;

use commands::{run_config, run_fetch};

/// Top-level CLI for the carrier transfer-job controller.
#[derive(Debug, Parser)]
#[command(name = "carrier")]
#[command(about = "carrier: queued transfer-job controller with disk-space accounting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Copy local source files into the managed download directory through
    /// the full admission/retry/progress pipeline.
    Fetch {
        /// Source files to transfer.
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Override the managed download directory for this run.
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Override the concurrency limit for this run.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print the effective configuration and its file location.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                sources,
                dest,
                limit,
            } => run_fetch(cfg, sources, dest, limit).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
