//! Fleet Shared Types
//!
//! This crate provides the identifiers, collaborator messages and error
//! taxonomy shared between the fleet checker and the services it talks to.

pub mod compliance;
pub mod error;

use std::fmt;

pub use compliance::Compliance;
pub use error::CheckError;

/// Dispatch parameters for the fleet checker
pub mod dispatch {
    /// Default upper bound on device checks executing at once
    pub const DEFAULT_MAX_CONCURRENCY: usize = 32;
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string value
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw string value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Opaque customer identifier, never validated by the checker
    CustomerId
}

string_id! {
    /// Opaque device identifier, unique within one customer's fleet
    DeviceId
}

string_id! {
    /// Firmware release identifier.
    ///
    /// Versions are compared by exact equality only; there is no ordering
    /// between releases as far as compliance is concerned.
    FirmwareVersion
}

/// Request for the devices registered to a customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCustomerDevicesRequest {
    pub customer_id: CustomerId,
}

impl GetCustomerDevicesRequest {
    pub fn new(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
        }
    }
}

/// Device ids for a customer, in directory order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetCustomerDevicesResponse {
    pub device_ids: Vec<DeviceId>,
}

/// Request for a device's current system information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceSystemInfoRequest {
    pub device_id: DeviceId,
}

impl GetDeviceSystemInfoRequest {
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

/// System information reported by a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSystemInfo {
    pub device_id: DeviceId,
    pub firmware_version: FirmwareVersion,
}

/// Command asking a device to move to a firmware version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceFirmwareRequest {
    pub device_id: DeviceId,
    pub version: FirmwareVersion,
}

impl UpdateDeviceFirmwareRequest {
    /// Build an update command for one device
    pub fn new(device_id: impl Into<DeviceId>, version: impl Into<FirmwareVersion>) -> Self {
        Self {
            device_id: device_id.into(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_conversion() {
        let id = DeviceId::from("d1");
        assert_eq!(id.as_str(), "d1");
        assert_eq!(id.to_string(), "d1");
        assert_eq!(id, DeviceId::new(String::from("d1")));
    }

    #[test]
    fn test_update_request_creation() {
        let request = UpdateDeviceFirmwareRequest::new("d2", "1.0");
        assert_eq!(request.device_id, DeviceId::from("d2"));
        assert_eq!(request.version, FirmwareVersion::from("1.0"));
    }

    #[test]
    fn test_directory_request_creation() {
        let request = GetCustomerDevicesRequest::new("cust-1");
        assert_eq!(request.customer_id.as_str(), "cust-1");
    }
}
