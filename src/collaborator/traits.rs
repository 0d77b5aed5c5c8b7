//! Collaborator trait abstraction for the remote fleet services

use anyhow::Result;
use async_trait::async_trait;
use fleet_shared::{
    DeviceSystemInfo, GetCustomerDevicesRequest, GetCustomerDevicesResponse,
    GetDeviceSystemInfoRequest, UpdateDeviceFirmwareRequest,
};

/// Resolves the devices registered to a customer
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Look up a customer's device ids, in directory order
    async fn get_customer_devices(
        &self,
        request: GetCustomerDevicesRequest,
    ) -> Result<GetCustomerDevicesResponse>;
}

/// Talks to individual devices
///
/// Implementations own their own retry, timeout and per-device serialization
/// policy. Calls for different devices may arrive concurrently.
#[async_trait]
pub trait DeviceCommunicator: Send + Sync {
    /// Read a device's current system information
    async fn get_device_system_info(
        &self,
        request: GetDeviceSystemInfoRequest,
    ) -> Result<DeviceSystemInfo>;

    /// Submit a firmware update command; no response beyond acceptance
    async fn update_device_firmware(&self, request: UpdateDeviceFirmwareRequest) -> Result<()>;
}
