//! Fleet supervisor - starts every device and stops them together

use crate::config::FleetConfig;
use crate::device::{DeviceHandle, DeviceRuntime};
use crate::devices::DeviceModel;
use crate::hub::HubConnector;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of a fleet run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    /// Devices whose runtimes were joined
    pub stopped: Vec<String>,
    /// Devices whose send path ended with an error, with the error text
    pub failed: Vec<(String, String)>,
    /// Configured devices that never started
    pub skipped: Vec<String>,
}

pub struct FleetSupervisor {
    config: FleetConfig,
    connector: Arc<dyn HubConnector>,
    shutdown: CancellationToken,
    running: Vec<DeviceHandle>,
    skipped: Vec<String>,
    started: bool,
}

impl FleetSupervisor {
    pub fn new(config: FleetConfig, connector: Arc<dyn HubConnector>) -> Self {
        Self {
            config,
            connector,
            shutdown: CancellationToken::new(),
            running: Vec::new(),
            skipped: Vec::new(),
            started: false,
        }
    }

    pub fn running_ids(&self) -> Vec<&str> {
        self.running.iter().map(DeviceHandle::id).collect()
    }

    /// Start one runtime per configured device id. Returns how many started.
    ///
    /// Only the first call starts anything.
    pub async fn start_all(&mut self) -> usize {
        if self.started {
            warn!(running = self.running.len(), "fleet already started");
            return 0;
        }
        self.started = true;

        info!(
            devices = self.config.device_ids.len(),
            hub = self.connector.name(),
            "starting fleet"
        );

        for device_id in self.config.device_ids.clone() {
            if self.running.iter().any(|handle| handle.id() == device_id) {
                warn!(device = %device_id, "device already running, skipping duplicate");
                self.skipped.push(device_id);
                continue;
            }

            let Some(model) = DeviceModel::from_device_id(&device_id) else {
                warn!(device = %device_id, "unknown device model, skipping");
                self.skipped.push(device_id);
                continue;
            };

            let profile = model.profile(&device_id);
            let hub = match self.connector.connect(&profile.identity).await {
                Ok(hub) => hub,
                Err(e) => {
                    error!(device = %device_id, error = %e, "hub connection failed, skipping");
                    self.skipped.push(device_id);
                    continue;
                }
            };

            let runtime = DeviceRuntime::new(
                profile,
                hub,
                self.shutdown.clone(),
                self.config.poll_interval,
            );
            info!(device = %device_id, model = %model, "device connected");
            self.running.push(runtime.start().await);
        }

        info!(
            running = self.running.len(),
            skipped = self.skipped.len(),
            "fleet started"
        );
        self.running.len()
    }

    /// Signal shutdown and join every runtime
    pub async fn shutdown(self) -> FleetReport {
        info!(devices = self.running.len(), "stopping fleet");
        self.shutdown.cancel();

        let joins = self.running.into_iter().map(|handle| async move {
            let id = handle.id().to_string();
            (id, handle.join().await)
        });

        let mut report = FleetReport {
            skipped: self.skipped,
            ..Default::default()
        };
        for (id, result) in join_all(joins).await {
            if let Err(e) = result {
                error!(device = %id, error = %e, "device ended with error");
                report.failed.push((id.clone(), e.to_string()));
            }
            report.stopped.push(id);
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "fleet stopped"
        );
        report
    }
}
