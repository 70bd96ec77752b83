//! Fleet cluster access and unit repair primitives.
//!
//! This crate contains the engine pieces behind the fleetmend reconciler:
//! - [`api::FleetApi`]: the cluster API capability interface, with an HTTP
//!   implementation ([`client::HttpFleetClient`]) and an in-memory mock
//!   ([`api::MockFleet`])
//! - [`accessor::Fleet`]: the retrying accessor facade shared by all tasks
//! - [`controller::UnitController`]: stop/start with stability-polled waits
//! - [`detector::InvalidUnitDetector`]: one-shot scan for failed or
//!   unexpectedly inactive units

pub mod accessor;
pub mod api;
pub mod client;
pub mod controller;
pub mod detector;
pub mod error;
pub mod retry;
pub mod schema;

pub use accessor::Fleet;
pub use api::FleetApi;
pub use client::HttpFleetClient;
pub use controller::{ControllerConfig, UnitController};
pub use detector::{InvalidUnitDetector, UnitState};
pub use error::{AggregateError, FleetError};
pub use retry::RetryPolicy;
pub use schema::TargetState;
