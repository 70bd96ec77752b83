//! Unit state-transition controller.
//!
//! Drives a unit toward a target state and waits for it to settle there.
//! The wait is a polling state machine: a unit is only considered stable
//! after four consecutive matching observations, which filters out a single
//! stale or racy read while keeping the total wait short once the unit has
//! settled.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::accessor::Fleet;
use crate::error::FleetError;
use crate::schema::TargetState;

/// Timing parameters for the stability-polling loop.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Poll delay while the unit has not matched the target state.
    pub initial_poll_delay: Duration,

    /// Poll delay while a match streak is building.
    pub settled_poll_delay: Duration,

    /// Consecutive matching polls required before the unit counts as stable.
    pub stable_polls: u32,

    /// Ceiling on the total wait; exceeding it reports a timeout.
    pub wait_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_poll_delay: Duration::from_secs(2),
            settled_poll_delay: Duration::from_millis(500),
            stable_polls: 4,
            wait_timeout: Duration::from_secs(60),
        }
    }
}

/// Controller for starting and stopping units with stability waits.
#[derive(Clone)]
pub struct UnitController {
    fleet: Fleet,
    config: ControllerConfig,
}

impl UnitController {
    pub fn new(fleet: Fleet, config: ControllerConfig) -> Self {
        Self { fleet, config }
    }

    /// Request that the unit be launched.
    pub async fn start(&self, name: &str) -> Result<(), FleetError> {
        self.fleet
            .set_desired_state(name, TargetState::Launched)
            .await
    }

    /// Request that the unit be stopped.
    pub async fn stop(&self, name: &str) -> Result<(), FleetError> {
        self.fleet
            .set_desired_state(name, TargetState::Inactive)
            .await
    }

    /// Block until the unit is stably running, or a timeout occurs.
    pub async fn wait_until_started(&self, name: &str) -> Result<(), FleetError> {
        self.wait_until_stable(name, TargetState::Launched).await
    }

    /// Block until the unit is stably stopped, or a timeout occurs.
    pub async fn wait_until_stopped(&self, name: &str) -> Result<(), FleetError> {
        self.wait_until_stable(name, TargetState::Inactive).await
    }

    async fn wait_until_stable(&self, name: &str, target: TargetState) -> Result<(), FleetError> {
        let start = Instant::now();
        let mut delay = self.config.initial_poll_delay;
        let mut streak: u32 = 0;

        loop {
            tokio::time::sleep(delay).await;

            if self.observes_state(name, target).await? {
                streak += 1;
                delay = self.config.settled_poll_delay;
                if streak >= self.config.stable_polls {
                    debug!(unit = %name, state = %target, "unit is stable");
                    return Ok(());
                }
            } else {
                streak = 0;
                delay = self.config.initial_poll_delay;
            }

            if start.elapsed() > self.config.wait_timeout {
                return Err(FleetError::Timeout);
            }
        }
    }

    /// Whether the unit currently observes the target state.
    ///
    /// Global units never populate a current state; their desired state is
    /// the only available signal.
    async fn observes_state(&self, name: &str, target: TargetState) -> Result<bool, FleetError> {
        let unit = self.fleet.unit(name).await?;
        let state = if unit.is_global() {
            Some(unit.desired_state.as_str())
        } else {
            unit.current_state.as_deref()
        };
        debug!(unit = %name, state = ?state, "observed unit state");
        Ok(state == Some(target.as_str()))
    }
}
