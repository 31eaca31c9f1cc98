//! Hub emulator configuration

use anyhow::{bail, Context};
use clap::Parser;
use greenhouse_shared::descriptor::{self, SHARED_ACCESS_KEY_NAME};
use greenhouse_shared::HubCredentials;
use std::path::{Path, PathBuf};

/// Local stand-in for the cloud hub
#[derive(Parser, Debug, Clone)]
#[command(name = "hub-emulator", version, about)]
pub struct HubConfig {
    /// Address devices connect to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub device_listen: String,

    /// Address of the direct-method HTTP endpoint
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub http_listen: String,

    /// File with the hub access policies, one connection string per line
    #[arg(long, default_value = "iot-hub-connection-strings")]
    pub credentials: PathBuf,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::parse_from(["hub-emulator"])
    }
}

/// Load every access policy from `path`; at least one is required
pub fn load_credentials(path: &Path) -> anyhow::Result<Vec<HubCredentials>> {
    let entries = descriptor::read_descriptor_file(path, SHARED_ACCESS_KEY_NAME)?;

    let credentials = entries
        .iter()
        .map(|(name, descriptor)| {
            HubCredentials::from_descriptor(descriptor)
                .with_context(|| format!("access policy {name} in {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if credentials.is_empty() {
        bail!("no access policy found in {}", path.display());
    }
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("policies-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.device_listen, "0.0.0.0:8080");
        assert_eq!(config.http_listen, "0.0.0.0:8081");
        assert_eq!(config.credentials, PathBuf::from("iot-hub-connection-strings"));
    }

    #[test]
    fn test_load_credentials() {
        let path = write_temp(
            "# policies\n\
             HostName=hub.local;SharedAccessKeyName=service;SharedAccessKey=c2VjcmV0\n\
             HostName=hub.local;SharedAccessKeyName=iothubowner;SharedAccessKey=b3duZXI=\n",
        );
        let credentials = load_credentials(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let names: Vec<&str> = credentials.iter().map(|c| c.policy_name.as_str()).collect();
        assert_eq!(names, vec!["service", "iothubowner"]);
    }

    #[test]
    fn test_empty_or_broken_file_fails() {
        let empty = write_temp("# nothing here\n");
        assert!(load_credentials(&empty).is_err());
        std::fs::remove_file(&empty).unwrap();

        let broken = write_temp("HostName=hub.local;SharedAccessKeyName=service\n");
        assert!(load_credentials(&broken).is_err());
        std::fs::remove_file(&broken).unwrap();
    }
}
