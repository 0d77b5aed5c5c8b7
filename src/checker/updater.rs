//! Shared firmware update operation

use crate::collaborator::DeviceCommunicator;
use fleet_shared::{CheckError, DeviceId, FirmwareVersion, UpdateDeviceFirmwareRequest};
use std::sync::Arc;
use tracing::info;

/// Relays firmware update commands to the device communicator.
///
/// Cheap to clone; every device check holds its own handle. Calls are
/// stateless and may run concurrently. No retry and no deduplication: two
/// calls for the same device produce two submissions.
#[derive(Clone)]
pub struct FirmwareUpdater {
    communicator: Arc<dyn DeviceCommunicator>,
}

impl FirmwareUpdater {
    pub fn new(communicator: Arc<dyn DeviceCommunicator>) -> Self {
        Self { communicator }
    }

    /// Submit an update moving `device_id` to `version`
    pub async fn update_device(
        &self,
        device_id: &DeviceId,
        version: &FirmwareVersion,
    ) -> Result<(), CheckError> {
        info!("[CHECKER] Updating device {} to version {}", device_id, version);

        let request = UpdateDeviceFirmwareRequest::new(device_id.clone(), version.clone());

        self.communicator
            .update_device_firmware(request)
            .await
            .map_err(|e| CheckError::UpdateSubmission {
                device_id: device_id.clone(),
                reason: format!("{:#}", e),
            })
    }
}
