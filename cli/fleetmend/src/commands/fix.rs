use anyhow::Result;
use clap::Args;

/// Reconciliation pass with remediation enabled.
#[derive(Debug, Args)]
pub struct FixCommand {
    /// Only log what would be fixed; issue no control commands.
    #[arg(long)]
    dry_run: bool,
}

impl FixCommand {
    pub async fn run(&self, endpoint: &str) -> Result<()> {
        super::run_reconciliation(endpoint, self.dry_run).await
    }
}
