use fleet_checker::{
    CheckerConfig, CustomerId, FirmwareVersion, FleetChecker, InMemoryFleet, SimulationConfig,
};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let sim = SimulationConfig::default();
    let fleet = Arc::new(InMemoryFleet::simulated(&sim));
    let customer_id = CustomerId::from(sim.customer_id.as_str());
    let target_version = FirmwareVersion::from(sim.target_version.as_str());

    info!("Simulated fleet for {}", customer_id);
    info!("  Devices: {} ({:?} per device call)", sim.device_count, sim.latency);
    info!("  Target firmware: {}", target_version);

    let checker = FleetChecker::with_config(
        fleet.clone(),
        fleet.clone(),
        CheckerConfig {
            await_completion: true,
            ..Default::default()
        },
    );

    let started = Instant::now();
    let checked = checker
        .check_devices_iteratively(&customer_id, &target_version)
        .await?;
    info!("Sequential: {} devices checked in {:?}", checked, started.elapsed());

    let started = Instant::now();
    let dispatched = checker
        .check_devices_concurrently(&customer_id, &target_version)
        .await?;
    info!("Concurrent: {} devices checked in {:?}", dispatched, started.elapsed());

    info!(
        "Update submissions across both runs: {}",
        fleet.update_requests().await.len()
    );

    Ok(())
}
