//! Wire types for the fleet cluster HTTP API.
//!
//! These mirror the JSON schema served under `/fleet/v1/`. Only the fields
//! this tool consumes are modeled.

use serde::{Deserialize, Serialize};

/// One page of the cluster-wide unit state listing (`GET /fleet/v1/state`).
#[derive(Debug, Clone, Deserialize)]
pub struct UnitStatesPage {
    #[serde(default)]
    pub states: Vec<UnitStatus>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}

/// Reported runtime state of a single unit on its hosting machine.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitStatus {
    pub name: String,

    /// Raw systemd active state string (`"active"`, `"inactive"`, `"failed"`, ...).
    #[serde(rename = "systemdActiveState", default)]
    pub systemd_active_state: String,

    /// Machine currently reporting this unit.
    #[serde(rename = "machineID", default)]
    pub machine_id: String,
}

/// A unit definition with its scheduling state (`GET /fleet/v1/units/{name}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Unit {
    pub name: String,

    #[serde(default)]
    pub options: Vec<UnitOption>,

    /// Last observed runtime state. Never populated for global units.
    #[serde(rename = "currentState", default)]
    pub current_state: Option<String>,

    /// Requested target runtime state.
    #[serde(rename = "desiredState", default)]
    pub desired_state: String,

    /// Machine the unit is (or is desired to be) scheduled on.
    #[serde(rename = "machineID", default)]
    pub machine_id: Option<String>,
}

impl Unit {
    /// Whether this unit is replicated on every cluster member.
    ///
    /// Derived from the unit definition: `[X-Fleet] Global=true`.
    pub fn is_global(&self) -> bool {
        self.options.iter().any(|opt| {
            opt.section.eq_ignore_ascii_case("x-fleet")
                && opt.name.eq_ignore_ascii_case("global")
                && opt.value.eq_ignore_ascii_case("true")
        })
    }

    /// Look up an option value by section and name, case-insensitively.
    pub fn option(&self, section: &str, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|opt| {
                opt.section.eq_ignore_ascii_case(section) && opt.name.eq_ignore_ascii_case(name)
            })
            .map(|opt| opt.value.as_str())
    }
}

/// One line of a unit definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(section: &str, name: &str, value: &str) -> Self {
        Self {
            section: section.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Desired runtime state requested through a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Unit should be loaded and running.
    Launched,
    /// Unit should be stopped.
    Inactive,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Launched => "launched",
            TargetState::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_states_page_deserialization() {
        let json = r#"{
            "states": [
                {
                    "name": "web.service",
                    "hash": "0d1c46",
                    "machineID": "mach-1",
                    "systemdActiveState": "failed",
                    "systemdLoadState": "loaded",
                    "systemdSubState": "failed"
                }
            ],
            "nextPageToken": "page-2"
        }"#;

        let page: UnitStatesPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.states.len(), 1);
        assert_eq!(page.states[0].name, "web.service");
        assert_eq!(page.states[0].systemd_active_state, "failed");
        assert_eq!(page.states[0].machine_id, "mach-1");
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_unit_deserialization() {
        let json = r#"{
            "name": "db.service",
            "desiredState": "launched",
            "currentState": "launched",
            "machineID": "mach-2",
            "options": [
                {"section": "Service", "name": "Type", "value": "oneshot"},
                {"section": "X-Fleet", "name": "Global", "value": "true"}
            ]
        }"#;

        let unit: Unit = serde_json::from_str(json).unwrap();
        assert_eq!(unit.desired_state, "launched");
        assert_eq!(unit.current_state.as_deref(), Some("launched"));
        assert!(unit.is_global());
        assert_eq!(unit.option("service", "type"), Some("oneshot"));
        assert_eq!(unit.option("Unit", "StopWhenUnneeded"), None);
    }

    #[test]
    fn test_global_units_have_no_current_state() {
        let json = r#"{"name": "proxy.service", "desiredState": "launched"}"#;
        let unit: Unit = serde_json::from_str(json).unwrap();
        assert!(unit.current_state.is_none());
        assert!(!unit.is_global());
    }

    #[test]
    fn test_target_state_strings() {
        assert_eq!(TargetState::Launched.as_str(), "launched");
        assert_eq!(TargetState::Inactive.to_string(), "inactive");
        let json = serde_json::to_string(&TargetState::Launched).unwrap();
        assert_eq!(json, "\"launched\"");
    }
}
