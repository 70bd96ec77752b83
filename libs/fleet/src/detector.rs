//! Invalid-unit detection.
//!
//! Scans the reported runtime state of every unit once and streams the ones
//! in a faulty state:
//! - failed units are always an anomaly
//! - inactive units are an anomaly only when they are expected to be active
//!
//! Each scan is fresh; nothing is retained between invocations.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::accessor::Fleet;
use crate::error::FleetError;
use crate::schema::Unit;

/// A unit observed in an unexpected runtime state.
///
/// At most one of `failed`/`inactive` is set; healthy units are never
/// constructed.
#[derive(Debug, Clone)]
pub struct UnitState {
    pub name: String,
    pub failed: bool,
    pub inactive: bool,
    pub global: bool,
    pub machine_id: String,
}

impl UnitState {
    pub fn state(&self) -> &'static str {
        if self.failed {
            "failed"
        } else if self.inactive {
            "inactive"
        } else {
            "?"
        }
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.state())
    }
}

/// Scans all units and streams the ones in a faulty state.
#[derive(Clone)]
pub struct InvalidUnitDetector {
    fleet: Fleet,
}

impl InvalidUnitDetector {
    pub fn new(fleet: Fleet) -> Self {
        Self { fleet }
    }

    /// Run one detection scan, sending every invalid unit into `tx`.
    ///
    /// A metadata lookup failure for a single unit is logged and that unit
    /// skipped; only the cluster-wide state listing itself is fatal.
    pub async fn scan(&self, tx: mpsc::Sender<UnitState>) -> Result<(), FleetError> {
        let states = self.fleet.unit_states().await?;
        debug!(unit_count = states.len(), "scanning unit states");

        for status in states {
            let invalid = match status.systemd_active_state.as_str() {
                "failed" => match self.fleet.unit(&status.name).await {
                    Ok(unit) => Some(UnitState {
                        name: status.name,
                        failed: true,
                        inactive: false,
                        global: unit.is_global(),
                        machine_id: status.machine_id,
                    }),
                    Err(err) => {
                        warn!(unit = %status.name, error = %err, "metadata lookup failed, skipping failed unit");
                        None
                    }
                },
                "inactive" => {
                    // Only service units can be expected-active; everything
                    // else is intentionally idle when inactive.
                    if !status.name.ends_with(".service") {
                        None
                    } else {
                        match self.fleet.unit(&status.name).await {
                            Ok(unit) if expected_active(&unit) => Some(UnitState {
                                name: status.name,
                                failed: false,
                                inactive: true,
                                global: unit.is_global(),
                                machine_id: status.machine_id,
                            }),
                            Ok(_) => None,
                            Err(err) => {
                                warn!(unit = %status.name, error = %err, "metadata lookup failed, skipping inactive unit");
                                None
                            }
                        }
                    }
                }
                _ => None,
            };

            if let Some(state) = invalid {
                if tx.send(state).await.is_err() {
                    // Consumer is gone; nothing left to report to.
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

/// Whether an inactive unit is supposed to be running.
///
/// Oneshot units intentionally end up inactive, and stop-when-unneeded units
/// are intentionally idle when nothing references them.
fn expected_active(unit: &Unit) -> bool {
    if unit
        .option("Service", "Type")
        .is_some_and(|v| v.eq_ignore_ascii_case("oneshot"))
    {
        return false;
    }
    if unit
        .option("Unit", "StopWhenUnneeded")
        .is_some_and(|v| v.eq_ignore_ascii_case("yes"))
    {
        return false;
    }
    true
}
