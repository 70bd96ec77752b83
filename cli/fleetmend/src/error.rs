//! Error display for the CLI.

use colored::Colorize;

use fleetmend_fleet::FleetError;

/// Print an error in a user-friendly format, with a hint where one helps.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(fleet_err) = err.downcast_ref::<FleetError>() {
        match fleet_err {
            FleetError::InvalidEndpoint(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check the --endpoint flag or FLEETMEND_ENDPOINT.".yellow()
                );
            }
            FleetError::Transport(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check that the fleet API endpoint is reachable.".yellow()
                );
            }
            _ => {}
        }
    }
}
