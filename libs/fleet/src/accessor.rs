//! Retrying facade over the raw fleet API.
//!
//! Every call that can fail transiently is wrapped in the exponential-backoff
//! retry policy, so callers only ever see success, a non-transient error, or
//! a transient error that outlived the retry budget.

use std::sync::Arc;

use tracing::debug;

use crate::api::FleetApi;
use crate::error::FleetError;
use crate::retry::{retry, RetryPolicy};
use crate::schema::{TargetState, Unit, UnitStatus};

/// Shared, retrying accessor for the fleet cluster API.
///
/// Cheap to clone; all detection and remediation tasks share one underlying
/// API connection.
#[derive(Clone)]
pub struct Fleet {
    api: Arc<dyn FleetApi>,
    retry: RetryPolicy,
}

impl Fleet {
    pub fn new(api: Arc<dyn FleetApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Fetch the runtime state of every unit in the cluster.
    pub async fn unit_states(&self) -> Result<Vec<UnitStatus>, FleetError> {
        retry(&self.retry, || self.api.list_unit_states()).await
    }

    /// Fetch a single unit definition.
    pub async fn unit(&self, name: &str) -> Result<Unit, FleetError> {
        retry(&self.retry, || self.api.get_unit(name)).await
    }

    /// Request a new desired state for a unit.
    ///
    /// No-op when the unit's current desired state already equals the
    /// requested one.
    pub async fn set_desired_state(
        &self,
        name: &str,
        target: TargetState,
    ) -> Result<(), FleetError> {
        let unit = self.unit(name).await?;
        if unit.desired_state == target.as_str() {
            debug!(unit = %name, state = %target, "unit already has requested desired state, doing nothing");
            return Ok(());
        }
        retry(&self.retry, || self.api.set_unit_target_state(name, target)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockFleet, MockUnit};

    fn fleet_with(api: MockFleet) -> (Fleet, Arc<MockFleet>) {
        let api = Arc::new(api);
        (
            Fleet::new(api.clone(), RetryPolicy::fast()),
            api,
        )
    }

    #[tokio::test]
    async fn test_unit_states_retries_transient_failures() {
        let mock = MockFleet::new();
        mock.insert(MockUnit::new("a.service"));
        mock.fail_next(2);
        let (fleet, _api) = fleet_with(mock);

        let states = fleet.unit_states().await.unwrap();
        assert_eq!(states.len(), 1);
    }

    #[tokio::test]
    async fn test_set_desired_state_skips_when_already_set() {
        let mock = MockFleet::new();
        mock.insert(MockUnit::new("a.service").desired("launched"));
        let (fleet, api) = fleet_with(mock);

        fleet
            .set_desired_state("a.service", TargetState::Launched)
            .await
            .unwrap();

        assert!(api.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_desired_state_issues_change() {
        let mock = MockFleet::new();
        mock.insert(MockUnit::new("a.service").desired("launched"));
        let (fleet, api) = fleet_with(mock);

        fleet
            .set_desired_state("a.service", TargetState::Inactive)
            .await
            .unwrap();

        assert_eq!(
            api.set_calls(),
            vec![("a.service".to_string(), TargetState::Inactive)]
        );
        assert_eq!(api.desired_state_of("a.service").unwrap(), "inactive");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mock = MockFleet::new();
        let (fleet, api) = fleet_with(mock);

        let err = fleet.unit("missing.service").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(api.get_call_count(), 1);
    }
}
