//! Device check task - one firmware compliance check for one device

use super::updater::FirmwareUpdater;
use crate::collaborator::DeviceCommunicator;
use fleet_shared::{
    CheckError, Compliance, DeviceId, FirmwareVersion, GetDeviceSystemInfoRequest,
};
use std::sync::Arc;
use tracing::debug;

/// Result of a device check that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Device already runs the target release
    Compliant,
    /// Device was out of date and an update was submitted
    UpdateSubmitted,
}

/// Self-contained check of a single device.
///
/// Owns its device id and target version; reaches the device and the shared
/// update operation only through the handles passed in at construction.
pub struct DeviceCheckTask {
    device_id: DeviceId,
    target_version: FirmwareVersion,
    communicator: Arc<dyn DeviceCommunicator>,
    updater: FirmwareUpdater,
}

impl DeviceCheckTask {
    pub fn new(
        device_id: DeviceId,
        target_version: FirmwareVersion,
        communicator: Arc<dyn DeviceCommunicator>,
        updater: FirmwareUpdater,
    ) -> Self {
        Self {
            device_id,
            target_version,
            communicator,
            updater,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Fetch the device's firmware, compare it with the target and submit an
    /// update on any mismatch. Runs at most once; not retried.
    pub async fn run(self) -> Result<CheckOutcome, CheckError> {
        let info = self
            .communicator
            .get_device_system_info(GetDeviceSystemInfoRequest::new(self.device_id.clone()))
            .await
            .map_err(|e| CheckError::DeviceUnreachable {
                device_id: self.device_id.clone(),
                reason: format!("{:#}", e),
            })?;

        let compliance = Compliance::evaluate(&info.firmware_version, &self.target_version);
        debug!(
            "[TASK] {} reports {} (target {}): {:?}",
            self.device_id, info.firmware_version, self.target_version, compliance
        );

        if !compliance.needs_update() {
            return Ok(CheckOutcome::Compliant);
        }

        self.updater
            .update_device(&self.device_id, &self.target_version)
            .await?;

        Ok(CheckOutcome::UpdateSubmitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::InMemoryFleet;
    use fleet_shared::UpdateDeviceFirmwareRequest;

    fn task_for(fleet: &Arc<InMemoryFleet>, device: &str, target: &str) -> DeviceCheckTask {
        DeviceCheckTask::new(
            DeviceId::from(device),
            FirmwareVersion::from(target),
            fleet.clone(),
            FirmwareUpdater::new(fleet.clone()),
        )
    }

    #[tokio::test]
    async fn test_compliant_device_is_left_alone() {
        let fleet = Arc::new(InMemoryFleet::new().with_device("d1", "1.0"));

        let outcome = task_for(&fleet, "d1", "1.0").run().await.unwrap();

        assert_eq!(outcome, CheckOutcome::Compliant);
        assert!(fleet.update_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_older_device_is_updated() {
        let fleet = Arc::new(InMemoryFleet::new().with_device("d1", "1.8"));

        let outcome = task_for(&fleet, "d1", "1.9").run().await.unwrap();

        assert_eq!(outcome, CheckOutcome::UpdateSubmitted);
        assert_eq!(
            fleet.update_requests().await,
            vec![UpdateDeviceFirmwareRequest::new("d1", "1.9")]
        );
    }

    #[tokio::test]
    async fn test_newer_device_is_updated() {
        let fleet = Arc::new(InMemoryFleet::new().with_device("d1", "2.0"));

        let outcome = task_for(&fleet, "d1", "1.9").run().await.unwrap();

        assert_eq!(outcome, CheckOutcome::UpdateSubmitted);
        assert_eq!(
            fleet.update_requests().await,
            vec![UpdateDeviceFirmwareRequest::new("d1", "1.9")]
        );
    }

    #[tokio::test]
    async fn test_unreachable_device_reports_error() {
        let fleet = Arc::new(
            InMemoryFleet::new()
                .with_device("d2", "1.0")
                .with_unreachable_device("d2"),
        );

        let err = task_for(&fleet, "d2", "2.0").run().await.unwrap_err();

        assert_eq!(err.device_id(), Some(&DeviceId::from("d2")));
        assert!(matches!(err, CheckError::DeviceUnreachable { .. }));
        assert!(fleet.update_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_update_reports_error() {
        let fleet = Arc::new(
            InMemoryFleet::new()
                .with_device("d3", "1.0")
                .with_rejected_update("d3"),
        );

        let err = task_for(&fleet, "d3", "2.0").run().await.unwrap_err();

        assert!(matches!(err, CheckError::UpdateSubmission { .. }));
    }
}
