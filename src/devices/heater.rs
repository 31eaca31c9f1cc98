//! Heater controller

use super::controller_identity;
use crate::device::{DeviceProfile, SendBehavior};
use crate::method::handlers::{handle_heater_turn_off, handle_heater_turn_on};
use crate::method::{DispatchTable, ParamKind, ParamSpec};

pub fn heater_profile(device_id: &str) -> DeviceProfile {
    DeviceProfile {
        identity: controller_identity(device_id),
        behavior: SendBehavior::Idle,
        dispatch: DispatchTable::builder()
            .method(
                "turn_on",
                vec![ParamSpec::optional("duration_in_min", ParamKind::Number, 0)],
                handle_heater_turn_on,
            )
            .method("turn_off", vec![], handle_heater_turn_off)
            .build(),
    }
}
