//! In-memory simulated fleet
//!
//! Implements both collaborator traits against a fixed fleet definition. Used
//! by the demo binary in place of the remote services, and by the tests as a
//! recording double.

use super::traits::{DeviceCommunicator, DeviceDirectory};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fleet_shared::{
    CustomerId, DeviceId, DeviceSystemInfo, FirmwareVersion, GetCustomerDevicesRequest,
    GetCustomerDevicesResponse, GetDeviceSystemInfoRequest, UpdateDeviceFirmwareRequest,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

/// Parameters for generating a simulated fleet
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Customer owning the simulated fleet
    pub customer_id: String,
    /// Number of devices in the fleet
    pub device_count: usize,
    /// Release the fleet should be running
    pub target_version: String,
    /// Release reported by devices that are out of date
    pub stale_version: String,
    /// Every Nth device already runs the target release (0 = none)
    pub compliant_every: usize,
    /// Simulated round-trip time of each device call
    pub latency: Duration,
    /// Index of a device that never answers
    pub unreachable_device: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            customer_id: "cust-1".into(),
            device_count: 24,
            target_version: "2.4.0".into(),
            stale_version: "2.3.1".into(),
            compliant_every: 3,
            latency: Duration::from_millis(100),
            unreachable_device: Some(7),
        }
    }
}

/// Fleet state held in memory, with a record of every device interaction
#[derive(Default)]
pub struct InMemoryFleet {
    customers: HashMap<CustomerId, Vec<DeviceId>>,
    versions: HashMap<DeviceId, FirmwareVersion>,
    failing_directories: HashSet<CustomerId>,
    unreachable: HashSet<DeviceId>,
    rejecting: HashSet<DeviceId>,
    latency: Duration,
    /// Device calls wait on this until it is closed
    hold: Option<Arc<Semaphore>>,
    directory_lookups: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    info_requests: Mutex<Vec<DeviceId>>,
    updates: Mutex<Vec<UpdateDeviceFirmwareRequest>>,
}

impl InMemoryFleet {
    /// Create an empty fleet with no customers
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fleet from simulation parameters
    pub fn simulated(config: &SimulationConfig) -> Self {
        let mut fleet = Self::new().with_latency(config.latency);
        let mut devices = Vec::with_capacity(config.device_count);

        for index in 0..config.device_count {
            let device_id = format!("{}-dev-{:03}", config.customer_id, index);
            let compliant = config.compliant_every > 0 && index % config.compliant_every == 0;
            let version = if compliant {
                &config.target_version
            } else {
                &config.stale_version
            };
            fleet = fleet.with_device(device_id.as_str(), version.as_str());
            if config.unreachable_device == Some(index) {
                fleet = fleet.with_unreachable_device(device_id.as_str());
            }
            devices.push(device_id);
        }

        let device_refs: Vec<&str> = devices.iter().map(String::as_str).collect();
        fleet.with_customer(config.customer_id.as_str(), &device_refs)
    }

    /// Register a customer and its devices, in directory order
    pub fn with_customer(mut self, customer_id: &str, device_ids: &[&str]) -> Self {
        self.customers.insert(
            CustomerId::from(customer_id),
            device_ids.iter().map(|id| DeviceId::from(*id)).collect(),
        );
        self
    }

    /// Set the firmware a device reports
    pub fn with_device(mut self, device_id: &str, version: &str) -> Self {
        self.versions
            .insert(DeviceId::from(device_id), FirmwareVersion::from(version));
        self
    }

    /// Make the directory lookup fail for a customer
    pub fn with_failing_directory(mut self, customer_id: &str) -> Self {
        self.failing_directories.insert(CustomerId::from(customer_id));
        self
    }

    /// Make a device fail every system info request
    pub fn with_unreachable_device(mut self, device_id: &str) -> Self {
        self.unreachable.insert(DeviceId::from(device_id));
        self
    }

    /// Make a device reject every firmware update
    pub fn with_rejected_update(mut self, device_id: &str) -> Self {
        self.rejecting.insert(DeviceId::from(device_id));
        self
    }

    /// Delay every device call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Hold every system info request until [`release`](Self::release) is called
    pub fn with_hold(mut self) -> Self {
        self.hold = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let held and future device calls proceed
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.close();
        }
    }

    /// Number of directory lookups served
    pub fn directory_lookups(&self) -> usize {
        self.directory_lookups.load(Ordering::SeqCst)
    }

    /// Highest number of system info requests observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Devices queried for system info, in arrival order
    pub async fn info_requests(&self) -> Vec<DeviceId> {
        self.info_requests.lock().await.clone()
    }

    /// Update commands received, in arrival order
    pub async fn update_requests(&self) -> Vec<UpdateDeviceFirmwareRequest> {
        self.updates.lock().await.clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryFleet {
    async fn get_customer_devices(
        &self,
        request: GetCustomerDevicesRequest,
    ) -> Result<GetCustomerDevicesResponse> {
        self.directory_lookups.fetch_add(1, Ordering::SeqCst);

        if self.failing_directories.contains(&request.customer_id) {
            return Err(anyhow!("Directory service unavailable"));
        }

        let device_ids = self
            .customers
            .get(&request.customer_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown customer: {}", request.customer_id))?;

        Ok(GetCustomerDevicesResponse { device_ids })
    }
}

#[async_trait]
impl DeviceCommunicator for InMemoryFleet {
    async fn get_device_system_info(
        &self,
        request: GetDeviceSystemInfoRequest,
    ) -> Result<DeviceSystemInfo> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.info_requests.lock().await.push(request.device_id.clone());

        if let Some(hold) = &self.hold {
            // Closed semaphore means released
            let _ = hold.acquire().await;
        }
        self.simulate_latency().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unreachable.contains(&request.device_id) {
            return Err(anyhow!("Device {} did not respond", request.device_id));
        }

        let firmware_version = self
            .versions
            .get(&request.device_id)
            .cloned()
            .ok_or_else(|| anyhow!("Device {} is not registered", request.device_id))?;

        Ok(DeviceSystemInfo {
            device_id: request.device_id,
            firmware_version,
        })
    }

    async fn update_device_firmware(&self, request: UpdateDeviceFirmwareRequest) -> Result<()> {
        self.simulate_latency().await;

        if self.rejecting.contains(&request.device_id) {
            return Err(anyhow!("Device {} rejected the update", request.device_id));
        }

        self.updates.lock().await.push(request);
        Ok(())
    }
}
