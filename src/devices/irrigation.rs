//! Irrigation valve controller

use super::controller_identity;
use crate::device::{DeviceProfile, SendBehavior};
use crate::method::handlers::{handle_irrigation_turn_off, handle_irrigation_turn_on};
use crate::method::{DispatchTable, ParamKind, ParamSpec};

pub fn irrigation_profile(device_id: &str) -> DeviceProfile {
    DeviceProfile {
        identity: controller_identity(device_id),
        behavior: SendBehavior::Idle,
        dispatch: DispatchTable::builder()
            .method(
                "turn_on",
                vec![ParamSpec::optional("duration_in_min", ParamKind::Number, 0)],
                handle_irrigation_turn_on,
            )
            .method("turn_off", vec![], handle_irrigation_turn_off)
            .build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::HandlerContext;
    use greenhouse_shared::{keys, MethodRequest, StatusCode};
    use serde_json::json;

    fn call(method: &str, payload: serde_json::Value) -> greenhouse_shared::MethodResponse {
        let profile = irrigation_profile("Irrigation-2");
        let ctx = HandlerContext::for_identity(&profile.identity);
        let request = MethodRequest::new(method, "r-1", payload.as_object().cloned().unwrap_or_default());
        profile.dispatch.dispatch(&ctx, &request)
    }

    #[test]
    fn test_turn_on_with_and_without_duration() {
        let response = call("turn_on", json!({"duration_in_min": 10}));
        assert_eq!(response.status, StatusCode::Ok);
        assert!(!response.payload.contains_key(keys::RESULT));

        assert_eq!(call("turn_on", json!({})).status, StatusCode::Ok);
    }

    #[test]
    fn test_turn_on_accepts_any_numeric_duration() {
        for duration in [json!(-5), json!(10.0), json!(0.5)] {
            let response = call("turn_on", json!({"duration_in_min": duration}));
            assert_eq!(response.status, StatusCode::Ok, "duration {duration}");
            assert_eq!(response.payload[keys::METHOD], json!("turn_on"));
        }
    }

    #[test]
    fn test_turn_on_rejects_misshapen_arguments() {
        assert_eq!(call("turn_on", json!({"duration_in_min": "ten"})).status, StatusCode::BadArgs);
        assert_eq!(call("turn_on", json!({"minutes": 5})).status, StatusCode::BadArgs);
    }

    #[test]
    fn test_turn_off_takes_no_arguments() {
        assert_eq!(call("turn_off", json!({})).status, StatusCode::Ok);
        assert_eq!(call("turn_off", json!({"now": true})).status, StatusCode::BadArgs);
    }
}
