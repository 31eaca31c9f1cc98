//! Concrete greenhouse devices
//!
//! Each model provides a telemetry source or a set of method handlers; the
//! generic runtime does the rest.

mod air;
mod heater;
mod irrigation;
mod soil;

pub use air::AirSensor;
pub use heater::heater_profile;
pub use irrigation::irrigation_profile;
pub use soil::SoilSensor;

use crate::device::{DeviceProfile, SendBehavior};
use crate::method::DispatchTable;
use greenhouse_shared::{model_of, timing, DeviceIdentity, DeviceKind};
use std::fmt;
use std::time::Duration;

/// Device models known to the simulator, named by the device id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    SoilSensor,
    AirSensor,
    Irrigation,
    Heater,
}

impl DeviceModel {
    /// Resolve the model from an id such as `Irrigation-2`
    pub fn from_device_id(device_id: &str) -> Option<Self> {
        match model_of(device_id) {
            "SoilSensor" => Some(DeviceModel::SoilSensor),
            "AirSensor" => Some(DeviceModel::AirSensor),
            "Irrigation" => Some(DeviceModel::Irrigation),
            "Heater" => Some(DeviceModel::Heater),
            _ => None,
        }
    }

    /// Build the runtime profile for device `device_id` of this model
    pub fn profile(self, device_id: &str) -> DeviceProfile {
        match self {
            DeviceModel::SoilSensor => sensor_profile(device_id, SoilSensor::new(device_id)),
            DeviceModel::AirSensor => sensor_profile(device_id, AirSensor::new()),
            DeviceModel::Irrigation => irrigation_profile(device_id),
            DeviceModel::Heater => heater_profile(device_id),
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceModel::SoilSensor => "SoilSensor",
            DeviceModel::AirSensor => "AirSensor",
            DeviceModel::Irrigation => "Irrigation",
            DeviceModel::Heater => "Heater",
        };
        f.write_str(name)
    }
}

/// Sensors push periodically and answer no methods
fn sensor_profile(device_id: &str, source: impl crate::device::TelemetrySource) -> DeviceProfile {
    DeviceProfile {
        identity: DeviceIdentity::new(
            device_id,
            DeviceKind::Sensor,
            Duration::from_secs(timing::SENSOR_SEND_INTERVAL_SECS),
        ),
        behavior: SendBehavior::periodic(source),
        dispatch: DispatchTable::empty(),
    }
}

fn controller_identity(device_id: &str) -> DeviceIdentity {
    DeviceIdentity::new(
        device_id,
        DeviceKind::Controller,
        Duration::from_secs(timing::CONTROLLER_SEND_INTERVAL_SECS),
    )
}

/// Round to one decimal place
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_id_prefix() {
        assert_eq!(DeviceModel::from_device_id("SoilSensor-1"), Some(DeviceModel::SoilSensor));
        assert_eq!(DeviceModel::from_device_id("AirSensor-7"), Some(DeviceModel::AirSensor));
        assert_eq!(DeviceModel::from_device_id("Irrigation-2"), Some(DeviceModel::Irrigation));
        assert_eq!(DeviceModel::from_device_id("Heater"), Some(DeviceModel::Heater));
        assert_eq!(DeviceModel::from_device_id("Sprinkler-1"), None);
    }

    #[test]
    fn test_profiles_match_model_kind() {
        let soil = DeviceModel::SoilSensor.profile("SoilSensor-3");
        assert_eq!(soil.identity.kind(), DeviceKind::Sensor);
        assert_eq!(soil.identity.send_interval(), Duration::from_secs(5));
        assert!(matches!(soil.behavior, SendBehavior::Periodic(_)));
        assert!(soil.dispatch.method_names().is_empty());

        let heater = DeviceModel::Heater.profile("Heater-1");
        assert_eq!(heater.identity.kind(), DeviceKind::Controller);
        assert_eq!(heater.identity.send_interval(), Duration::from_secs(15));
        assert!(matches!(heater.behavior, SendBehavior::Idle));
        assert_eq!(heater.dispatch.method_names(), vec!["turn_off", "turn_on"]);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(6.7999), 6.8);
        assert_eq!(round1(5.44), 5.4);
        assert_eq!(round1(22.05_f64 + 0.001), 22.1);
    }
}
