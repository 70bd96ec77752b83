//! End-to-end reconciliation pass.
//!
//! The service runs the invalid-unit detector twice, separated by a settle
//! delay, and only remediates units that were faulty in both scans. This
//! trades a fixed detection latency for not remediating units that were
//! merely mid-transition. The second scan is streamed through a bounded
//! queue into a fixed pool of repair workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use fleetmend_fleet::{
    AggregateError, ControllerConfig, Fleet, FleetError, InvalidUnitDetector, UnitController,
    UnitState,
};

/// Reconciliation pass configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Detect and log only; never issue control commands.
    pub dry_run: bool,

    /// Wait between the two detection scans, letting transient faults
    /// self-resolve.
    pub settle_delay: Duration,

    /// Number of concurrent repair workers.
    pub worker_count: usize,

    /// Capacity of the detector-to-worker queue.
    pub queue_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            settle_delay: Duration::from_secs(30),
            worker_count: 5,
            queue_depth: 16,
        }
    }
}

/// Top-level orchestrator: stability filter plus repair worker pool.
pub struct ReconciliationService {
    config: ServiceConfig,
    detector: InvalidUnitDetector,
    controller: UnitController,
}

impl ReconciliationService {
    pub fn new(fleet: Fleet, controller_config: ControllerConfig, config: ServiceConfig) -> Self {
        Self {
            config,
            detector: InvalidUnitDetector::new(fleet.clone()),
            controller: UnitController::new(fleet, controller_config),
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// Returns `Ok(())` when no persistently invalid units were found or all
    /// repairs succeeded; otherwise the aggregate of every failure collected
    /// across the detection task and all workers. A single unit's failure
    /// never aborts the pass.
    pub async fn run(&self) -> Result<(), AggregateError> {
        let initial = self.collect_invalid_units().await?;
        if initial.is_empty() {
            debug!("no invalid units found");
            return Ok(());
        }

        info!(
            count = initial.len(),
            settle_secs = self.config.settle_delay.as_secs(),
            "found invalid units, waiting a bit for stability"
        );
        tokio::time::sleep(self.config.settle_delay).await;

        let (unit_tx, unit_rx) = mpsc::channel::<UnitState>(self.config.queue_depth);
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<FleetError>();

        // Second detection scan, streamed live to the workers.
        let scan_handle = tokio::spawn({
            let detector = self.detector.clone();
            let err_tx = err_tx.clone();
            async move {
                if let Err(err) = detector.scan(unit_tx).await {
                    error!(error = %err, "second detection scan failed");
                    let _ = err_tx.send(err);
                }
            }
        });

        let unit_rx = Arc::new(Mutex::new(unit_rx));
        let initial = Arc::new(initial);
        let mut workers = Vec::with_capacity(self.config.worker_count);
        for worker_id in 0..self.config.worker_count {
            let unit_rx = Arc::clone(&unit_rx);
            let initial = Arc::clone(&initial);
            let controller = self.controller.clone();
            let err_tx = err_tx.clone();
            let dry_run = self.config.dry_run;

            workers.push(tokio::spawn(async move {
                loop {
                    let unit = { unit_rx.lock().await.recv().await };
                    let Some(unit) = unit else { break };

                    if initial.contains_key(&unit.name) {
                        info!(unit = %unit, worker_id, "found invalid unit");
                        if dry_run {
                            continue;
                        }
                        if let Err(err) = fix_unit(&controller, &unit).await {
                            error!(unit = %unit.name, error = %err, "failed to fix unit");
                            let _ = err_tx.send(err);
                        }
                    } else {
                        // Not yet confirmed persistent; a later pass will
                        // remediate it if it stays faulty.
                        info!(unit = %unit, "found new invalid unit");
                    }
                }
            }));
        }
        drop(err_tx);

        if let Err(err) = scan_handle.await {
            error!(error = %err, "detection task failed");
        }
        for worker in workers {
            if let Err(err) = worker.await {
                error!(error = %err, "repair worker failed");
            }
        }

        let mut errors = Vec::new();
        while let Some(err) = err_rx.recv().await {
            errors.push(err);
        }
        AggregateError::into_result(errors)
    }

    /// First detection scan, materialized into a membership set by name.
    async fn collect_invalid_units(
        &self,
    ) -> Result<HashMap<String, UnitState>, AggregateError> {
        let (tx, mut rx) = mpsc::channel::<UnitState>(self.config.queue_depth);

        let (scan_result, invalid_units) = tokio::join!(self.detector.scan(tx), async move {
            let mut invalid_units = HashMap::new();
            while let Some(state) = rx.recv().await {
                invalid_units.insert(state.name.clone(), state);
            }
            invalid_units
        });

        match scan_result {
            Ok(()) => Ok(invalid_units),
            Err(err) => Err(AggregateError(vec![err])),
        }
    }
}

/// Repair a single persistently invalid unit.
///
/// Non-global units are stopped first; a degraded stop is recoverable by a
/// fresh start, so stop failures are logged but do not abort the fix. The
/// start and its stability wait decide the outcome.
async fn fix_unit(controller: &UnitController, unit: &UnitState) -> Result<(), FleetError> {
    if !unit.global {
        info!(unit = %unit.name, "stopping unit");
        if let Err(err) = controller.stop(&unit.name).await {
            warn!(unit = %unit.name, error = %err, "failed to request stop");
        } else {
            match controller.wait_until_stopped(&unit.name).await {
                Ok(()) => info!(unit = %unit.name, "unit is stopped"),
                Err(err) if err.is_timeout() => {
                    error!(unit = %unit.name, "failed to stop unit in time")
                }
                Err(err) => error!(unit = %unit.name, error = %err, "failed to stop unit"),
            }
        }
    }

    info!(unit = %unit.name, "starting unit");
    controller.start(&unit.name).await?;

    match controller.wait_until_started(&unit.name).await {
        Ok(()) => {
            info!(unit = %unit.name, "unit is started");
            Ok(())
        }
        Err(err) => {
            if err.is_timeout() {
                error!(unit = %unit.name, "failed to start unit in time");
            } else {
                error!(unit = %unit.name, error = %err, "failed to start unit");
            }
            Err(err)
        }
    }
}
