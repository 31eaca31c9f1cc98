//! Command line and fleet configuration

use anyhow::Context;
use clap::Parser;
use greenhouse_shared::descriptor::{self, DEVICE_ID};
use greenhouse_shared::timing;
use std::path::PathBuf;
use std::time::Duration;

/// Simulated greenhouse edge devices
#[derive(Parser, Debug, Clone)]
#[command(name = "greenhouse-edge", version, about)]
pub struct Args {
    /// File with one device connection string per line
    #[arg(long, default_value = "device-connection-strings")]
    pub devices: PathBuf,

    /// Address of the hub emulator's device port
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub hub: String,

    /// Run against an in-process hub instead of the emulator
    #[arg(long)]
    pub offline: bool,

    /// Poll timeout for method requests, in milliseconds
    #[arg(long, default_value_t = timing::POLL_INTERVAL_MS)]
    pub poll_ms: u64,

    /// Seconds to wait for each device's hub connection
    #[arg(long, default_value_t = 5)]
    pub connect_timeout_secs: u64,
}

/// What the fleet supervisor starts
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Device ids in file order
    pub device_ids: Vec<String>,
    pub poll_interval: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            device_ids: Vec::new(),
            poll_interval: Duration::from_millis(timing::POLL_INTERVAL_MS),
        }
    }
}

impl FleetConfig {
    pub fn with_devices<I, S>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_ids: device_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Load device ids from the descriptor file named on the command line
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let entries = descriptor::read_descriptor_file(&args.devices, DEVICE_ID)
            .with_context(|| format!("loading devices from {}", args.devices.display()))?;

        Ok(Self {
            poll_interval: Duration::from_millis(args.poll_ms.max(1)),
            ..Self::with_devices(entries.into_iter().map(|(id, _)| id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["greenhouse-edge"]);
        assert_eq!(args.devices, PathBuf::from("device-connection-strings"));
        assert_eq!(args.hub, "127.0.0.1:8080");
        assert!(!args.offline);
        assert_eq!(args.poll_ms, 100);

        assert_eq!(FleetConfig::default().poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_from_args_reads_descriptor_file() {
        let path = std::env::temp_dir().join(format!("devices-{}", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "# fleet\n\
             HostName=hub.local;DeviceId=SoilSensor-1;SharedAccessKey=a2V5\n\
             \n\
             HostName=hub.local;DeviceId=Irrigation-1;SharedAccessKey=a2V5\n",
        )
        .unwrap();

        let args = Args::parse_from([
            "greenhouse-edge",
            "--devices",
            path.to_str().unwrap(),
            "--poll-ms",
            "50",
        ]);
        let config = FleetConfig::from_args(&args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.device_ids, vec!["SoilSensor-1", "Irrigation-1"]);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file_is_error() {
        let args = Args::parse_from(["greenhouse-edge", "--devices", "/nonexistent/devices"]);
        assert!(FleetConfig::from_args(&args).is_err());
    }
}
