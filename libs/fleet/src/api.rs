//! Cluster API capability interface and mock implementation.
//!
//! The interface abstracts the three fleet API calls this tool needs:
//! - Listing the runtime state of every unit
//! - Fetching a single unit definition
//! - Requesting a new desired state for a unit
//!
//! A mock implementation is provided for testing and development.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FleetError;
use crate::schema::{TargetState, Unit, UnitOption, UnitStatus};

/// Fleet cluster API interface.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Fetch the reported runtime state of every unit in the cluster.
    async fn list_unit_states(&self) -> Result<Vec<UnitStatus>, FleetError>;

    /// Fetch a single unit definition with its scheduling state.
    async fn get_unit(&self, name: &str) -> Result<Unit, FleetError>;

    /// Request a new desired state for a unit.
    async fn set_unit_target_state(
        &self,
        name: &str,
        target: TargetState,
    ) -> Result<(), FleetError>;
}

/// A scripted unit inside [`MockFleet`].
///
/// `scan_states` is consumed one entry per `list_unit_states` call and
/// `observed_states` one entry per `get_unit` call; the last entry of each
/// queue repeats forever.
#[derive(Debug, Clone)]
pub struct MockUnit {
    pub name: String,
    pub options: Vec<UnitOption>,
    pub desired_state: String,
    pub scan_states: VecDeque<String>,
    pub observed_states: VecDeque<String>,
    /// When set, the observed state snaps to whatever desired state is
    /// requested (the unit "converges instantly").
    pub follow_desired: bool,
    pub machine_id: String,
}

impl MockUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: Vec::new(),
            desired_state: "launched".to_string(),
            scan_states: VecDeque::from(["active".to_string()]),
            observed_states: VecDeque::from(["launched".to_string()]),
            follow_desired: true,
            machine_id: "mach-1".to_string(),
        }
    }

    pub fn with_option(mut self, section: &str, name: &str, value: &str) -> Self {
        self.options.push(UnitOption::new(section, name, value));
        self
    }

    pub fn global(self) -> Self {
        self.with_option("X-Fleet", "Global", "true")
    }

    pub fn desired(mut self, state: &str) -> Self {
        self.desired_state = state.to_string();
        self
    }

    pub fn scan_states(mut self, states: &[&str]) -> Self {
        self.scan_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn observed_states(mut self, states: &[&str]) -> Self {
        self.observed_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    /// The unit never converges: observed state ignores desired-state changes.
    pub fn stuck(mut self) -> Self {
        self.follow_desired = false;
        self
    }

    fn is_global(&self) -> bool {
        self.options.iter().any(|opt| {
            opt.section.eq_ignore_ascii_case("x-fleet")
                && opt.name.eq_ignore_ascii_case("global")
                && opt.value.eq_ignore_ascii_case("true")
        })
    }
}

/// Advance a scripted state queue, keeping the final entry in place.
fn advance(queue: &mut VecDeque<String>) -> String {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or_default()
    } else {
        queue.front().cloned().unwrap_or_default()
    }
}

/// In-memory fleet API for testing and development.
#[derive(Default)]
pub struct MockFleet {
    units: Mutex<BTreeMap<String, MockUnit>>,
    set_calls: Mutex<Vec<(String, TargetState)>>,
    broken_units: Mutex<HashSet<String>>,
    list_calls: AtomicU32,
    get_calls: AtomicU32,
    transient_failures: AtomicU32,
}

impl MockFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, unit: MockUnit) {
        self.units
            .lock()
            .unwrap()
            .insert(unit.name.clone(), unit);
    }

    /// Make the next `n` API calls fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Make metadata lookups for `name` fail with `NotFound`.
    pub fn break_unit(&self, name: &str) {
        self.broken_units.lock().unwrap().insert(name.to_string());
    }

    /// Every `set_unit_target_state` call made so far, in order.
    pub fn set_calls(&self) -> Vec<(String, TargetState)> {
        self.set_calls.lock().unwrap().clone()
    }

    pub fn list_call_count(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_call_count(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn desired_state_of(&self, name: &str) -> Option<String> {
        self.units
            .lock()
            .unwrap()
            .get(name)
            .map(|u| u.desired_state.clone())
    }

    fn check_transient(&self) -> Result<(), FleetError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(FleetError::Transport("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FleetApi for MockFleet {
    async fn list_unit_states(&self) -> Result<Vec<UnitStatus>, FleetError> {
        self.check_transient()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let mut units = self.units.lock().unwrap();
        Ok(units
            .values_mut()
            .map(|unit| UnitStatus {
                name: unit.name.clone(),
                systemd_active_state: advance(&mut unit.scan_states),
                machine_id: unit.machine_id.clone(),
            })
            .collect())
    }

    async fn get_unit(&self, name: &str) -> Result<Unit, FleetError> {
        self.check_transient()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.broken_units.lock().unwrap().contains(name) {
            return Err(FleetError::NotFound(name.to_string()));
        }

        let mut units = self.units.lock().unwrap();
        let unit = units
            .get_mut(name)
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;

        let current_state = if unit.is_global() {
            None
        } else {
            Some(advance(&mut unit.observed_states))
        };

        Ok(Unit {
            name: unit.name.clone(),
            options: unit.options.clone(),
            current_state,
            desired_state: unit.desired_state.clone(),
            machine_id: Some(unit.machine_id.clone()),
        })
    }

    async fn set_unit_target_state(
        &self,
        name: &str,
        target: TargetState,
    ) -> Result<(), FleetError> {
        self.check_transient()?;
        self.set_calls
            .lock()
            .unwrap()
            .push((name.to_string(), target));

        let mut units = self.units.lock().unwrap();
        let unit = units
            .get_mut(name)
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;

        unit.desired_state = target.as_str().to_string();
        if unit.follow_desired {
            unit.observed_states = VecDeque::from([target.as_str().to_string()]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fleet_scripted_scan_states() {
        let fleet = MockFleet::new();
        fleet.insert(MockUnit::new("a.service").scan_states(&["active", "failed"]));

        let first = fleet.list_unit_states().await.unwrap();
        assert_eq!(first[0].systemd_active_state, "active");
        let second = fleet.list_unit_states().await.unwrap();
        assert_eq!(second[0].systemd_active_state, "failed");
        // Last entry repeats.
        let third = fleet.list_unit_states().await.unwrap();
        assert_eq!(third[0].systemd_active_state, "failed");
    }

    #[tokio::test]
    async fn test_mock_fleet_follow_desired() {
        let fleet = MockFleet::new();
        fleet.insert(MockUnit::new("a.service").observed_states(&["failed"]));

        fleet
            .set_unit_target_state("a.service", TargetState::Inactive)
            .await
            .unwrap();

        let unit = fleet.get_unit("a.service").await.unwrap();
        assert_eq!(unit.current_state.as_deref(), Some("inactive"));
        assert_eq!(unit.desired_state, "inactive");
        assert_eq!(fleet.set_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_fleet_global_unit_has_no_current_state() {
        let fleet = MockFleet::new();
        fleet.insert(MockUnit::new("g.service").global());

        let unit = fleet.get_unit("g.service").await.unwrap();
        assert!(unit.current_state.is_none());
    }

    #[tokio::test]
    async fn test_mock_fleet_unknown_unit() {
        let fleet = MockFleet::new();
        let err = fleet.get_unit("missing.service").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_fleet_injected_failures() {
        let fleet = MockFleet::new();
        fleet.insert(MockUnit::new("a.service"));
        fleet.fail_next(1);

        assert!(fleet.list_unit_states().await.unwrap_err().is_transient());
        assert!(fleet.list_unit_states().await.is_ok());
    }
}
