use anyhow::Result;
use clap::Args;

/// Read-only reconciliation pass: remediation is always disabled.
#[derive(Debug, Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn run(&self, endpoint: &str) -> Result<()> {
        super::run_reconciliation(endpoint, true).await
    }
}
