//! Hub client abstraction for pluggable backends

use super::HubError;
use async_trait::async_trait;
use bytes::Bytes;
use greenhouse_shared::{DeviceIdentity, MethodRequest, MethodResponse};
use std::sync::Arc;
use std::time::Duration;

/// One device's connection to the hub.
///
/// Both loops of a runtime share the same transport, so implementations must
/// tolerate concurrent calls.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Push a telemetry message
    async fn send_telemetry(&self, device_id: &str, message: Bytes) -> Result<(), HubError>;

    /// Wait up to `timeout` for the next method request addressed to this device
    async fn poll_method_request(
        &self,
        timeout: Duration,
    ) -> Result<Option<MethodRequest>, HubError>;

    /// Return the answer for a previously polled request
    async fn send_method_response(&self, response: MethodResponse) -> Result<(), HubError>;

    /// Close the link gracefully
    async fn disconnect(&self) -> Result<(), HubError> {
        Ok(())
    }
}

/// Factory for per-device hub transports
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Attempt to connect the device, returning its transport on success
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Arc<dyn HubTransport>, HubError>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
