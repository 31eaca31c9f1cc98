//! Method dispatcher: forwards direct methods to devices and waits for answers

use crate::session::SessionManager;
use greenhouse_shared::codec::HubFrame;
use greenhouse_shared::{MethodRequest, MethodResponse, Payload};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

/// Why a direct method produced no device response
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Device not connected: {0}")]
    NotConnected(String),

    #[error("Sending to {device} failed: {reason}")]
    SendFailed { device: String, reason: String },

    #[error("Device {0} disconnected before responding")]
    Disconnected(String),

    #[error("No response from {device} within {timeout:?}")]
    Timeout { device: String, timeout: Duration },
}

/// A request sent to a device and not yet answered
struct PendingMethod {
    device_id: String,
    method_name: String,
    sent_at: Instant,
    responder: oneshot::Sender<MethodResponse>,
}

type PendingMap = Arc<RwLock<HashMap<String, PendingMethod>>>;

/// Owns one pending entry for the lifetime of an `invoke` call
///
/// If the call is dropped before finishing, the entry is removed on drop.
struct PendingGuard {
    pending: PendingMap,
    request_id: String,
    armed: bool,
}

impl PendingGuard {
    fn new(pending: PendingMap, request_id: String) -> Self {
        Self {
            pending,
            request_id,
            armed: true,
        }
    }

    async fn remove(mut self) {
        self.pending.write().await.remove(&self.request_id);
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let request_id = std::mem::take(&mut self.request_id);
        debug!(request_id = %request_id, "caller gone, dropping pending method");

        if let Ok(mut pending) = self.pending.try_write() {
            pending.remove(&request_id);
            return;
        }
        let pending = self.pending.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                pending.write().await.remove(&request_id);
            });
        }
    }
}

/// Dispatches direct methods to devices and tracks responses
pub struct MethodDispatcher {
    session_manager: Arc<SessionManager>,
    /// Pending methods by request_id
    pending: PendingMap,
}

impl MethodDispatcher {
    pub fn new(session_manager: Arc<SessionManager>) -> Self {
        Self {
            session_manager,
            pending: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Send a method to `device_id` and wait up to `timeout` for its response
    pub async fn invoke(
        &self,
        device_id: &str,
        method_name: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<MethodResponse, DispatchError> {
        let session = self
            .session_manager
            .get(device_id)
            .await
            .ok_or_else(|| DispatchError::NotConnected(device_id.to_string()))?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let (responder, response_rx) = oneshot::channel();
        self.pending.write().await.insert(
            request_id.clone(),
            PendingMethod {
                device_id: device_id.to_string(),
                method_name: method_name.to_string(),
                sent_at: Instant::now(),
                responder,
            },
        );
        let guard = PendingGuard::new(self.pending.clone(), request_id.clone());

        let frame = HubFrame::MethodRequest(MethodRequest::new(method_name, request_id.clone(), payload));
        if let Err(e) = session.send(&frame).await {
            guard.remove().await;
            return Err(DispatchError::SendFailed {
                device: device_id.to_string(),
                reason: e.to_string(),
            });
        }
        info!(device = %device_id, method = %method_name, request_id = %request_id, "method sent");

        let outcome = tokio::time::timeout(timeout, response_rx).await;
        guard.remove().await;
        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DispatchError::Disconnected(device_id.to_string())),
            Err(_) => {
                warn!(device = %device_id, method = %method_name, "method timed out");
                Err(DispatchError::Timeout {
                    device: device_id.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Handle a response frame received from a device
    pub async fn handle_response(&self, device_id: &str, response: MethodResponse) {
        let mut pending = self.pending.write().await;

        let Some(entry) = pending.remove(&response.request_id) else {
            warn!(device = %device_id, request_id = %response.request_id, "response for unknown request");
            return;
        };
        if entry.device_id != device_id {
            warn!(
                device = %device_id,
                expected = %entry.device_id,
                request_id = %response.request_id,
                "response from wrong device, ignored"
            );
            pending.insert(response.request_id.clone(), entry);
            return;
        }

        info!(
            device = %device_id,
            method = %entry.method_name,
            status = response.status.as_u16(),
            elapsed_ms = entry.sent_at.elapsed().as_millis() as u64,
            "method answered"
        );
        // The HTTP caller may have timed out already.
        let _ = entry.responder.send(response);
    }

    /// Drop every pending method of a device whose session ended
    pub async fn fail_pending_for(&self, device_id: &str) -> usize {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, entry| entry.device_id != device_id);
        let dropped = before - pending.len();
        if dropped > 0 {
            debug!(device = %device_id, dropped, "pending methods dropped");
        }
        dropped
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}
