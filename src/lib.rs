//! Fleet firmware checker
//!
//! Checks every device of a customer against a target firmware release and
//! submits an update to each device that does not match, either one device at
//! a time or fanned out over a worker pool.

pub mod checker;
pub mod collaborator;

pub use checker::{CheckReport, CheckerConfig, Dispatch, FleetChecker};
pub use collaborator::{DeviceCommunicator, DeviceDirectory, InMemoryFleet, SimulationConfig};
pub use fleet_shared::{CheckError, CustomerId, DeviceId, FirmwareVersion};
