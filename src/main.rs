mod config;
mod device;
mod devices;
mod fleet;
mod hub;
mod method;

use clap::Parser;
use config::{Args, FleetConfig};
use fleet::FleetSupervisor;
use hub::memory::TelemetryRecord;
use hub::{HubConnector, MemoryHub, TcpHubConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = FleetConfig::from_args(&args)?;

    info!("Greenhouse edge starting: {} devices", config.device_ids.len());

    let connector: Arc<dyn HubConnector> = if args.offline {
        info!("  Hub: in-process (offline)");
        let hub = MemoryHub::new();
        tokio::spawn(log_telemetry(hub.subscribe_telemetry()));
        Arc::new(hub)
    } else {
        info!("  Hub: {}", args.hub);
        Arc::new(TcpHubConnector::new(
            args.hub.clone(),
            Duration::from_secs(args.connect_timeout_secs),
        ))
    };

    let mut supervisor = FleetSupervisor::new(config, connector);
    if supervisor.start_all().await == 0 {
        warn!("No device started; waiting for Ctrl-C anyway");
    } else {
        info!("Running: {}", supervisor.running_ids().join(", "));
    }

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");

    let report = supervisor.shutdown().await;
    for (device, reason) in &report.failed {
        warn!("{} stopped after send failure: {}", device, reason);
    }
    info!("All {} devices stopped", report.stopped.len());
    Ok(())
}

/// Offline runs have no emulator to print telemetry, so log it here
async fn log_telemetry(mut telemetry: broadcast::Receiver<TelemetryRecord>) {
    loop {
        match telemetry.recv().await {
            Ok(record) => info!(
                device = %record.device_id,
                body = %String::from_utf8_lossy(&record.body),
                "telemetry received"
            ),
            Err(RecvError::Lagged(missed)) => warn!(missed, "telemetry log fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
