//! Direct method handlers for the controller devices

mod heater;
mod irrigation;

pub use heater::{handle_heater_turn_off, handle_heater_turn_on};
pub use irrigation::{handle_irrigation_turn_off, handle_irrigation_turn_on};

use greenhouse_shared::{zone_label_of, DeviceIdentity};

/// Context passed to method handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
    pub device_id: String,
    /// Zone the device acts on, derived from the id suffix
    pub zone: String,
}

impl HandlerContext {
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let zone = zone_label_of(&device_id);
        Self { device_id, zone }
    }

    pub fn for_identity(identity: &DeviceIdentity) -> Self {
        Self::new(identity.id())
    }
}
