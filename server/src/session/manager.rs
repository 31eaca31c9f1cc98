//! Session manager for tracking all connected devices

use super::connection::SessionHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Manages all active device sessions
pub struct SessionManager {
    /// Map of device_id -> session handle
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a device session. A newer session for the same id replaces
    /// the old one.
    pub async fn register(&self, handle: SessionHandle) {
        if handle.device_id.is_empty() {
            return;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(old) = sessions.insert(handle.device_id.clone(), handle) {
            warn!(device = %old.device_id, addr = %old.addr, "session replaced");
        }
    }

    /// Unregister a session, unless it was already replaced by a newer one.
    /// Returns whether the session was removed.
    pub async fn unregister(&self, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(&handle.device_id)
            .is_some_and(|s| s.connected_at == handle.connected_at && s.addr == handle.addr);
        if current {
            sessions.remove(&handle.device_id);
        }
        current
    }

    pub async fn get(&self, device_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(device_id).cloned()
    }

    /// Connected device ids, sorted
    pub async fn connected_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
