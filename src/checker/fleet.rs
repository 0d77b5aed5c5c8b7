//! Fleet checker - resolves a customer's devices and schedules their checks

use super::pool::{panic_message, CheckReport, TaskExit, WorkerPool};
use super::task::DeviceCheckTask;
use super::updater::FirmwareUpdater;
use crate::collaborator::{DeviceCommunicator, DeviceDirectory};
use fleet_shared::{
    dispatch, CheckError, CustomerId, DeviceId, FirmwareVersion, GetCustomerDevicesRequest,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Configuration for the fleet checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Upper bound on concurrent device checks (None = unbounded)
    pub max_concurrency: Option<usize>,
    /// Make `check_devices_concurrently` wait for every check before returning
    pub await_completion: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Some(dispatch::DEFAULT_MAX_CONCURRENCY),
            await_completion: false,
        }
    }
}

impl CheckerConfig {
    /// One worker per device with no bound, as many as the fleet needs
    pub fn unbounded() -> Self {
        Self {
            max_concurrency: None,
            ..Default::default()
        }
    }
}

/// Device checks handed to a worker pool by a concurrent run
#[must_use]
pub struct Dispatch {
    pool: WorkerPool,
}

impl Dispatch {
    /// Number of device checks dispatched
    pub fn count(&self) -> usize {
        self.pool.submitted()
    }

    /// Wait for every dispatched check to finish
    pub async fn drain(self) -> CheckReport {
        self.pool.drain().await
    }

    /// Let the checks run on unobserved and return the dispatch count
    pub fn detach(self) -> usize {
        self.pool.submitted()
    }
}

/// Checks every device of a customer against a target firmware release.
///
/// The sequential and concurrent strategies build identical device checks;
/// they differ only in how those checks are scheduled.
pub struct FleetChecker {
    directory: Arc<dyn DeviceDirectory>,
    communicator: Arc<dyn DeviceCommunicator>,
    updater: FirmwareUpdater,
    config: CheckerConfig,
}

impl FleetChecker {
    /// Create a fleet checker with the default configuration
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        communicator: Arc<dyn DeviceCommunicator>,
    ) -> Self {
        Self::with_config(directory, communicator, CheckerConfig::default())
    }

    pub fn with_config(
        directory: Arc<dyn DeviceDirectory>,
        communicator: Arc<dyn DeviceCommunicator>,
        config: CheckerConfig,
    ) -> Self {
        let updater = FirmwareUpdater::new(communicator.clone());
        Self {
            directory,
            communicator,
            updater,
            config,
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check each device in directory order, one at a time.
    ///
    /// Every check, including its update, finishes before the next starts. A
    /// failing or panicking check is logged and the run moves on. Returns the
    /// number of devices checked.
    pub async fn check_devices_iteratively(
        &self,
        customer_id: &CustomerId,
        target_version: &FirmwareVersion,
    ) -> Result<usize, CheckError> {
        let device_ids = self.get_device_ids(customer_id).await?;
        let started = Instant::now();

        info!(
            "[CHECKER] Checking {} devices of {} against {} sequentially",
            device_ids.len(),
            customer_id,
            target_version
        );

        let mut report = CheckReport {
            dispatched: device_ids.len(),
            ..Default::default()
        };

        for device_id in &device_ids {
            let task = self.new_task(device_id.clone(), target_version.clone());

            let exit = match AssertUnwindSafe(task.run()).catch_unwind().await {
                Ok(result) => TaskExit::Finished(result),
                Err(payload) => TaskExit::Panicked(panic_message(&*payload)),
            };
            report.record(device_id, exit);
        }

        info!(
            "[CHECKER] Sequential check of {} done in {:?}: {} updated, {} compliant, {} failed",
            customer_id,
            started.elapsed(),
            report.updated,
            report.compliant,
            report.failed + report.panicked
        );

        Ok(device_ids.len())
    }

    /// Dispatch one check per device to a worker pool.
    ///
    /// Returns the number of checks dispatched. Unless
    /// [`CheckerConfig::await_completion`] is set, checks and their updates
    /// may still be running when this returns.
    pub async fn check_devices_concurrently(
        &self,
        customer_id: &CustomerId,
        target_version: &FirmwareVersion,
    ) -> Result<usize, CheckError> {
        let dispatch = self.dispatch_concurrently(customer_id, target_version).await?;

        if !self.config.await_completion {
            return Ok(dispatch.detach());
        }

        let count = dispatch.count();
        let report = dispatch.drain().await;
        info!(
            "[CHECKER] Concurrent check of {} drained: {} updated, {} compliant, {} failed",
            customer_id,
            report.updated,
            report.compliant,
            report.failed + report.panicked
        );
        Ok(count)
    }

    /// Dispatch one check per device and hand back the running pool.
    ///
    /// The pool is already shut down to new work; the caller decides whether
    /// to [`drain`](Dispatch::drain) it or [`detach`](Dispatch::detach) it.
    pub async fn dispatch_concurrently(
        &self,
        customer_id: &CustomerId,
        target_version: &FirmwareVersion,
    ) -> Result<Dispatch, CheckError> {
        let device_ids = self.get_device_ids(customer_id).await?;
        let mut pool = WorkerPool::new(self.config.max_concurrency);

        for device_id in device_ids {
            pool.submit(self.new_task(device_id, target_version.clone()))?;
        }
        pool.shutdown();

        info!(
            "[CHECKER] Dispatched {} device checks of {} against {} (limit: {:?})",
            pool.submitted(),
            customer_id,
            target_version,
            self.config.max_concurrency
        );

        Ok(Dispatch { pool })
    }

    /// Submit a firmware update for one device. Not deduplicated.
    pub async fn update_device(
        &self,
        device_id: &DeviceId,
        version: &FirmwareVersion,
    ) -> Result<(), CheckError> {
        self.updater.update_device(device_id, version).await
    }

    fn new_task(&self, device_id: DeviceId, target_version: FirmwareVersion) -> DeviceCheckTask {
        DeviceCheckTask::new(
            device_id,
            target_version,
            self.communicator.clone(),
            self.updater.clone(),
        )
    }

    async fn get_device_ids(&self, customer_id: &CustomerId) -> Result<Vec<DeviceId>, CheckError> {
        let response = self
            .directory
            .get_customer_devices(GetCustomerDevicesRequest::new(customer_id.clone()))
            .await
            .map_err(|e| CheckError::Directory {
                customer_id: customer_id.clone(),
                reason: format!("{:#}", e),
            })?;

        Ok(response.device_ids)
    }
}
