//! Firmware Compliance
//!
//! A device is compliant when its reported firmware exactly equals the target
//! release. Any difference, older or newer, requires an update.

use crate::FirmwareVersion;

/// Outcome of comparing a device's firmware with the target release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compliance {
    /// Device already runs the target release
    Compliant,
    /// Device runs any other release
    NonCompliant,
}

impl Compliance {
    /// Evaluate compliance of `current` against `target`
    pub fn evaluate(current: &FirmwareVersion, target: &FirmwareVersion) -> Self {
        if current == target {
            Self::Compliant
        } else {
            Self::NonCompliant
        }
    }

    pub fn needs_update(self) -> bool {
        self == Self::NonCompliant
    }
}
