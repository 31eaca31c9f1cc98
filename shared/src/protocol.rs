//! Protocol types exchanged between devices, the hub and callers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Free-form JSON object carried by method requests, responses and telemetry
pub type Payload = Map<String, Value>;

/// Well-known keys in a method response payload
pub mod keys {
    pub const RESPONSE: &str = "Response";
    pub const RESULT: &str = "Result";
    pub const DEVICE: &str = "Device";
    pub const METHOD: &str = "Method";
}

/// Broad device category, decides the send behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Sensor,
    Controller,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Sensor => write!(f, "sensor"),
            DeviceKind::Controller => write!(f, "controller"),
        }
    }
}

/// Identity of a simulated device. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
    kind: DeviceKind,
    send_interval: Duration,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, kind: DeviceKind, send_interval: Duration) -> Self {
        Self {
            id: id.into(),
            kind,
            send_interval,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// Device model named by the id prefix, e.g. `SoilSensor` for `SoilSensor-3`
    pub fn model(&self) -> &str {
        model_of(&self.id)
    }

    /// Trailing numeric suffix of the id, e.g. `3` for `SoilSensor-3`
    pub fn zone_suffix(&self) -> Option<&str> {
        zone_suffix_of(&self.id)
    }

    /// Zone label derived from the id, see [`zone_label_of`]
    pub fn zone_label(&self) -> String {
        zone_label_of(&self.id)
    }
}

/// Text before the first `-` of a device id
pub fn model_of(device_id: &str) -> &str {
    device_id
        .split_once('-')
        .map(|(model, _)| model)
        .unwrap_or(device_id)
}

/// Trailing ASCII digits of a device id, if any
pub fn zone_suffix_of(device_id: &str) -> Option<&str> {
    let start = device_id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    Some(&device_id[start..])
}

/// `zone-<suffix>` for ids ending in digits, otherwise the id itself
pub fn zone_label_of(device_id: &str) -> String {
    match zone_suffix_of(device_id) {
        Some(suffix) => format!("zone-{suffix}"),
        None => device_id.to_string(),
    }
}

/// A remote method invocation routed to one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRequest {
    pub method_name: String,
    pub request_id: String,
    #[serde(default)]
    pub payload: Payload,
}

impl MethodRequest {
    pub fn new(
        method_name: impl Into<String>,
        request_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            request_id: request_id.into(),
            payload,
        }
    }
}

/// Outcome code of a direct method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum StatusCode {
    Ok,
    BadArgs,
    NotFound,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadArgs => 400,
            StatusCode::NotFound => 404,
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(StatusCode::Ok),
            400 => Ok(StatusCode::BadArgs),
            404 => Ok(StatusCode::NotFound),
            other => Err(format!("unsupported method status {other}")),
        }
    }
}

/// Answer to a [`MethodRequest`], correlated by `request_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    pub request_id: String,
    pub status: StatusCode,
    pub payload: Payload,
}

impl MethodResponse {
    pub fn new(request_id: impl Into<String>, status: StatusCode, payload: Payload) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            payload,
        }
    }

    /// Value of the human readable `Response` field
    pub fn response_text(&self) -> Option<&str> {
        self.payload.get(keys::RESPONSE).and_then(Value::as_str)
    }
}

/// Telemetry pushed by a device; schema-free below the two top-level keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub info_group: String,
    pub measurements: Payload,
}

impl TelemetryMessage {
    pub fn new(info_group: impl Into<String>) -> Self {
        Self {
            info_group: info_group.into(),
            measurements: Payload::new(),
        }
    }

    /// Add a named measurement
    pub fn measurement(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.measurements.insert(name.to_string(), value.into());
        self
    }

    /// Serialize to the JSON bytes sent over the hub
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// HTTP body of a direct method invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMethodBody {
    pub method_name: String,
    pub response_timeout_in_seconds: u64,
    #[serde(default)]
    pub payload: Payload,
}

/// HTTP reply of the hub for a completed direct method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMethodResult {
    pub status: u16,
    pub payload: Payload,
}

impl From<MethodResponse> for DirectMethodResult {
    fn from(response: MethodResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            payload: response.payload,
        }
    }
}
