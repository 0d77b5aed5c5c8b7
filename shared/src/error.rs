//! Error taxonomy for fleet checks
//!
//! Directory failures abort a whole run. Device failures are scoped to the
//! single device check that produced them.

use thiserror::Error;

use crate::{CustomerId, DeviceId};

/// Errors that can occur while checking a fleet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("Device directory lookup failed for customer {customer_id}: {reason}")]
    Directory {
        customer_id: CustomerId,
        reason: String,
    },

    #[error("Device {device_id} unreachable: {reason}")]
    DeviceUnreachable { device_id: DeviceId, reason: String },

    #[error("Firmware update submission for device {device_id} failed: {reason}")]
    UpdateSubmission { device_id: DeviceId, reason: String },

    #[error("Worker pool is shut down and no longer accepts checks")]
    PoolShutDown,
}

impl CheckError {
    /// Whether this error aborts the whole run rather than a single device check
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Directory { .. } | Self::PoolShutDown)
    }

    /// The device this error is scoped to, if any
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::DeviceUnreachable { device_id, .. }
            | Self::UpdateSubmission { device_id, .. } => Some(device_id),
            Self::Directory { .. } | Self::PoolShutDown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_is_fatal() {
        let err = CheckError::Directory {
            customer_id: CustomerId::from("cust-404"),
            reason: "not found".into(),
        };
        assert!(err.is_fatal());
        assert!(err.device_id().is_none());
        assert!(err.to_string().contains("cust-404"));
    }

    #[test]
    fn test_device_errors_are_scoped() {
        let unreachable = CheckError::DeviceUnreachable {
            device_id: DeviceId::from("d2"),
            reason: "timeout".into(),
        };
        let rejected = CheckError::UpdateSubmission {
            device_id: DeviceId::from("d3"),
            reason: "rejected".into(),
        };

        assert!(!unreachable.is_fatal());
        assert!(!rejected.is_fatal());
        assert_eq!(unreachable.device_id(), Some(&DeviceId::from("d2")));
        assert_eq!(rejected.device_id(), Some(&DeviceId::from("d3")));
    }
}
