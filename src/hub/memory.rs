//! In-process hub used by tests and offline runs

use super::traits::{HubConnector, HubTransport};
use super::HubError;
use async_trait::async_trait;
use bytes::Bytes;
use greenhouse_shared::{DeviceIdentity, MethodRequest, MethodResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::debug;

/// Telemetry as observed by the hub
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub device_id: String,
    pub body: Bytes,
}

struct HubInner {
    devices: Mutex<HashMap<String, mpsc::Sender<MethodRequest>>>,
    pending: Mutex<HashMap<String, oneshot::Sender<MethodResponse>>>,
    telemetry: broadcast::Sender<TelemetryRecord>,
}

/// Routes method requests to connected devices and collects their telemetry
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        let (telemetry, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(HubInner {
                devices: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                telemetry,
            }),
        }
    }

    /// Receive every telemetry message sent after this call
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.inner.telemetry.subscribe()
    }
}

/// Caller side, driven by tests in place of the emulator's HTTP endpoint
#[cfg(test)]
impl MemoryHub {
    pub async fn is_connected(&self, device_id: &str) -> bool {
        self.inner.devices.lock().await.contains_key(device_id)
    }

    /// Invoke a direct method and wait up to `response_timeout` for the answer
    pub async fn invoke(
        &self,
        device_id: &str,
        method_name: &str,
        payload: greenhouse_shared::Payload,
        response_timeout: Duration,
    ) -> Result<MethodResponse, HubError> {
        let sender = self
            .inner
            .devices
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| HubError::Rejected(format!("device {device_id} is not connected")))?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .await
            .insert(request_id.clone(), response_tx);

        let request = MethodRequest::new(method_name, request_id.clone(), payload);
        if sender.send(request).await.is_err() {
            self.inner.pending.lock().await.remove(&request_id);
            return Err(HubError::Disconnected);
        }

        match timeout(response_timeout, response_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(HubError::Disconnected),
            Err(_) => {
                self.inner.pending.lock().await.remove(&request_id);
                Err(HubError::Rejected(format!("no response within {response_timeout:?}")))
            }
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HubConnector for MemoryHub {
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Arc<dyn HubTransport>, HubError> {
        let mut devices = self.inner.devices.lock().await;
        if devices.contains_key(identity.id()) {
            return Err(HubError::Rejected(format!(
                "device {} is already connected",
                identity.id()
            )));
        }

        let (request_tx, request_rx) = mpsc::channel(32);
        devices.insert(identity.id().to_string(), request_tx);

        Ok(Arc::new(MemoryLink {
            device_id: identity.id().to_string(),
            requests: Mutex::new(request_rx),
            hub: self.inner.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// A device's end of the in-memory hub
pub struct MemoryLink {
    device_id: String,
    requests: Mutex<mpsc::Receiver<MethodRequest>>,
    hub: Arc<HubInner>,
}

#[async_trait]
impl HubTransport for MemoryLink {
    async fn send_telemetry(&self, device_id: &str, message: Bytes) -> Result<(), HubError> {
        debug!(device = %device_id, bytes = message.len(), "telemetry accepted");
        // No subscribers is fine; telemetry is not persisted.
        let _ = self.hub.telemetry.send(TelemetryRecord {
            device_id: device_id.to_string(),
            body: message,
        });
        Ok(())
    }

    async fn poll_method_request(
        &self,
        poll_timeout: Duration,
    ) -> Result<Option<MethodRequest>, HubError> {
        let mut requests = self.requests.lock().await;
        match timeout(poll_timeout, requests.recv()).await {
            Ok(Some(request)) => Ok(Some(request)),
            Ok(None) => Err(HubError::Disconnected),
            Err(_) => Ok(None),
        }
    }

    async fn send_method_response(&self, response: MethodResponse) -> Result<(), HubError> {
        let waiter = self.hub.pending.lock().await.remove(&response.request_id);
        match waiter {
            Some(tx) => {
                // The caller may have given up already.
                let _ = tx.send(response);
                Ok(())
            }
            None => Err(HubError::Rejected(format!(
                "no pending request {}",
                response.request_id
            ))),
        }
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.hub.devices.lock().await.remove(&self.device_id);
        debug!(device = %self.device_id, "memory link closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_shared::{DeviceKind, Payload, StatusCode};

    fn identity(id: &str) -> DeviceIdentity {
        DeviceIdentity::new(id, DeviceKind::Controller, Duration::from_secs(15))
    }

    #[tokio::test]
    async fn test_invoke_round_trip() {
        let hub = MemoryHub::new();
        let link = hub.connect(&identity("Heater-1")).await.unwrap();

        let device = tokio::spawn(async move {
            let request = loop {
                if let Some(r) = link.poll_method_request(Duration::from_millis(100)).await.unwrap() {
                    break r;
                }
            };
            link.send_method_response(MethodResponse::new(
                request.request_id,
                StatusCode::Ok,
                Payload::new(),
            ))
            .await
            .unwrap();
        });

        let response = hub
            .invoke("Heater-1", "turn_on", Payload::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::Ok);
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_unknown_device() {
        let hub = MemoryHub::new();
        let result = hub
            .invoke("Nope-1", "turn_on", Payload::new(), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(HubError::Rejected(ref m)) if m.contains("not connected")));
    }

    #[tokio::test]
    async fn test_invoke_times_out_without_answer() {
        let hub = MemoryHub::new();
        let _link = hub.connect(&identity("Heater-2")).await.unwrap();
        let result = hub
            .invoke("Heater-2", "turn_on", Payload::new(), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(HubError::Rejected(ref m)) if m.starts_with("no response within")));
    }

    #[tokio::test]
    async fn test_duplicate_device_rejected_until_disconnect() {
        let hub = MemoryHub::new();
        let link = hub.connect(&identity("Irrigation-1")).await.unwrap();
        assert!(hub.connect(&identity("Irrigation-1")).await.is_err());

        link.disconnect().await.unwrap();
        assert!(!hub.is_connected("Irrigation-1").await);
        assert!(hub.connect(&identity("Irrigation-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_telemetry_reaches_subscribers() {
        let hub = MemoryHub::new();
        let mut telemetry = hub.subscribe_telemetry();
        let link = hub.connect(&identity("AirSensor-1")).await.unwrap();

        link.send_telemetry("AirSensor-1", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        let record = telemetry.recv().await.unwrap();
        assert_eq!(record.device_id, "AirSensor-1");
        assert_eq!(record.body, Bytes::from_static(b"{}"));
    }
}
