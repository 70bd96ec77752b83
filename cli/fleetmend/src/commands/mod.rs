//! CLI commands.

mod check;
mod fix;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fleetmend_fleet::{ControllerConfig, Fleet, HttpFleetClient, RetryPolicy};

use crate::service::{ReconciliationService, ServiceConfig};

/// fleetmend - detect and repair fleet units stuck in an invalid state.
#[derive(Debug, Parser)]
#[command(name = "fleetmend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Fleet API endpoint (unix, file, http or https scheme).
    #[arg(
        long,
        global = true,
        env = "FLEETMEND_ENDPOINT",
        default_value = "unix:///var/run/fleet.sock"
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check for invalid fleet units (detection and logging only).
    Check(check::CheckCommand),

    /// Fix invalid fleet units.
    Fix(fix::FixCommand),
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Check(cmd) => cmd.run(&self.endpoint).await,
            Commands::Fix(cmd) => cmd.run(&self.endpoint).await,
        }
    }
}

/// Build the service stack and run one reconciliation pass.
async fn run_reconciliation(endpoint: &str, dry_run: bool) -> Result<()> {
    let api = HttpFleetClient::new(endpoint).context("failed to create fleet accessor")?;
    let fleet = Fleet::new(Arc::new(api), RetryPolicy::default());
    let service = ReconciliationService::new(
        fleet,
        ControllerConfig::default(),
        ServiceConfig {
            dry_run,
            ..ServiceConfig::default()
        },
    );
    service.run().await?;
    Ok(())
}
