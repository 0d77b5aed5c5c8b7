//! Per-run worker pool for concurrent device checks

use super::task::{CheckOutcome, DeviceCheckTask};
use fleet_shared::{CheckError, DeviceId};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// How a device check left the worker
#[derive(Debug)]
pub(crate) enum TaskExit {
    Finished(Result<CheckOutcome, CheckError>),
    Panicked(String),
}

/// Tally of device checks that have run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Checks handed to a worker
    pub dispatched: usize,
    /// Devices already on the target release
    pub compliant: usize,
    /// Devices for which an update was submitted
    pub updated: usize,
    /// Checks that ended with a device-scoped error
    pub failed: usize,
    /// Checks that panicked
    pub panicked: usize,
}

impl CheckReport {
    /// Checks that ran to completion without error
    pub fn succeeded(&self) -> usize {
        self.compliant + self.updated
    }

    /// Checks that have finished one way or another
    pub fn finished(&self) -> usize {
        self.succeeded() + self.failed + self.panicked
    }

    pub(crate) fn record(&mut self, device_id: &DeviceId, exit: TaskExit) {
        match exit {
            TaskExit::Finished(Ok(CheckOutcome::Compliant)) => {
                debug!("[CHECKER] {} is compliant", device_id);
                self.compliant += 1;
            }
            TaskExit::Finished(Ok(CheckOutcome::UpdateSubmitted)) => {
                self.updated += 1;
            }
            TaskExit::Finished(Err(e)) => {
                warn!("[CHECKER] Check of {} failed: {}", device_id, e);
                self.failed += 1;
            }
            TaskExit::Panicked(message) => {
                error!("[CHECKER] Check of {} panicked: {}", device_id, message);
                self.panicked += 1;
            }
        }
    }
}

/// Render a panic payload for logging
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Executes device checks on the tokio runtime.
///
/// Created per run and write-once: checks are submitted, never inspected or
/// removed. With a limit, at most that many checks execute at once and the
/// rest wait on the semaphore; without one every check starts immediately.
/// Dropping the pool detaches whatever is still running.
pub struct WorkerPool {
    limit: Option<Arc<Semaphore>>,
    workers: Vec<(DeviceId, JoinHandle<Result<CheckOutcome, CheckError>>)>,
    accepting: bool,
}

impl WorkerPool {
    /// Create a pool; `None` places no bound on checks in flight
    pub fn new(max_concurrency: Option<usize>) -> Self {
        Self {
            limit: max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            workers: Vec::new(),
            accepting: true,
        }
    }

    /// Hand a check to a worker. Never waits for earlier checks.
    pub fn submit(&mut self, task: DeviceCheckTask) -> Result<(), CheckError> {
        if !self.accepting {
            return Err(CheckError::PoolShutDown);
        }

        let device_id = task.device_id().clone();
        let limit = self.limit.clone();

        let handle = tokio::spawn(async move {
            // Held until the check finishes
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            task.run().await
        });

        self.workers.push((device_id, handle));
        Ok(())
    }

    /// Stop accepting new checks. Submitted checks keep running.
    pub fn shutdown(&mut self) {
        if self.accepting {
            debug!("[POOL] Shutdown requested with {} checks submitted", self.workers.len());
        }
        self.accepting = false;
    }

    pub fn is_shut_down(&self) -> bool {
        !self.accepting
    }

    /// Number of checks submitted so far
    pub fn submitted(&self) -> usize {
        self.workers.len()
    }

    /// Shut down and wait for every submitted check to finish.
    ///
    /// A panicking check is counted, never propagated.
    pub async fn drain(mut self) -> CheckReport {
        self.shutdown();

        let mut report = CheckReport {
            dispatched: self.workers.len(),
            ..Default::default()
        };

        for (device_id, handle) in self.workers.drain(..) {
            let exit = match handle.await {
                Ok(result) => TaskExit::Finished(result),
                Err(e) if e.is_panic() => TaskExit::Panicked(panic_message(&*e.into_panic())),
                Err(e) => TaskExit::Panicked(e.to_string()),
            };
            report.record(&device_id, exit);
        }

        debug!("[POOL] Drained: {:?}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::updater::FirmwareUpdater;
    use crate::collaborator::InMemoryFleet;
    use fleet_shared::FirmwareVersion;
    use std::time::Duration;

    fn task_for(fleet: &Arc<InMemoryFleet>, device: &str, target: &str) -> DeviceCheckTask {
        DeviceCheckTask::new(
            DeviceId::from(device),
            FirmwareVersion::from(target),
            fleet.clone(),
            FirmwareUpdater::new(fleet.clone()),
        )
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let fleet = Arc::new(InMemoryFleet::new().with_device("d1", "1.0"));
        let mut pool = WorkerPool::new(None);

        pool.submit(task_for(&fleet, "d1", "1.0")).unwrap();
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert_eq!(
            pool.submit(task_for(&fleet, "d1", "1.0")),
            Err(CheckError::PoolShutDown)
        );
        assert_eq!(pool.submitted(), 1);

        // Work submitted before shutdown still completes
        let report = pool.drain().await;
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.compliant, 1);
    }

    #[tokio::test]
    async fn test_drain_tallies_outcomes() {
        let fleet = Arc::new(
            InMemoryFleet::new()
                .with_device("d1", "1.0")
                .with_device("d2", "0.9")
                .with_device("d3", "1.0")
                .with_unreachable_device("d3"),
        );
        let mut pool = WorkerPool::new(Some(2));

        for device in ["d1", "d2", "d3"] {
            pool.submit(task_for(&fleet, device, "1.0")).unwrap();
        }
        let report = pool.drain().await;

        assert_eq!(
            report,
            CheckReport {
                dispatched: 3,
                compliant: 1,
                updated: 1,
                failed: 1,
                panicked: 0,
            }
        );
        assert_eq!(report.finished(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_pool_limits_checks_in_flight() {
        let devices: Vec<String> = (0..12).map(|i| format!("d{}", i)).collect();
        let mut fleet = InMemoryFleet::new().with_latency(Duration::from_millis(20));
        for device in &devices {
            fleet = fleet.with_device(device, "1.0");
        }
        let fleet = Arc::new(fleet);

        let mut pool = WorkerPool::new(Some(3));
        for device in &devices {
            pool.submit(task_for(&fleet, device, "1.0")).unwrap();
        }
        let report = pool.drain().await;

        assert_eq!(report.compliant, 12);
        assert!(fleet.peak_in_flight() <= 3);
        assert!(fleet.peak_in_flight() >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unbounded_pool_starts_every_check() {
        let devices: Vec<String> = (0..8).map(|i| format!("d{}", i)).collect();
        let mut fleet = InMemoryFleet::new().with_hold();
        for device in &devices {
            fleet = fleet.with_device(device, "1.0");
        }
        let fleet = Arc::new(fleet);

        let mut pool = WorkerPool::new(None);
        for device in &devices {
            pool.submit(task_for(&fleet, device, "1.0")).unwrap();
        }

        // Every check reaches the device while all of them are held
        tokio::time::timeout(Duration::from_secs(5), async {
            while fleet.info_requests().await.len() < devices.len() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("checks did not all start");
        assert_eq!(fleet.peak_in_flight(), devices.len());

        fleet.release();
        let report = pool.drain().await;
        assert_eq!(report.compliant, devices.len());
    }

    #[test]
    fn test_panic_message_rendering() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
