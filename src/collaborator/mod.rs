//! Clients for the services the fleet checker depends on
//!
//! This module holds:
//! - The directory and device communication traits
//! - An in-memory simulated fleet implementing both

mod memory;
pub mod traits;

pub use memory::{InMemoryFleet, SimulationConfig};
pub use traits::{DeviceCommunicator, DeviceDirectory};
