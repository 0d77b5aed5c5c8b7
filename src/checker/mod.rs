//! Firmware compliance checking for a customer's fleet
//!
//! This module handles:
//! - Resolving a customer's devices through the directory
//! - Building one check per device
//! - Scheduling checks sequentially or on a per-run worker pool
//! - Relaying firmware updates for non-compliant devices

mod fleet;
mod pool;
mod task;
mod updater;

pub use fleet::{CheckerConfig, Dispatch, FleetChecker};
pub use pool::{CheckReport, WorkerPool};
pub use task::{CheckOutcome, DeviceCheckTask};
pub use updater::FirmwareUpdater;
