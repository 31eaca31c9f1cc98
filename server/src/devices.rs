//! Device port: accepts device links and routes their frames

use crate::command::MethodDispatcher;
use crate::session::{DeviceSession, SessionManager};
use greenhouse_shared::codec::HubFrame;
use greenhouse_shared::TelemetryMessage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Accept device connections until the listener fails
pub async fn serve_devices(
    listener: TcpListener,
    sessions: Arc<SessionManager>,
    dispatcher: Arc<MethodDispatcher>,
) -> anyhow::Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        socket.set_nodelay(true)?;
        debug!(%addr, "device connection accepted");

        let sessions = sessions.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            handle_device(DeviceSession::new(socket, addr), sessions, dispatcher).await;
        });
    }
}

/// Run one device session: Hello first, then telemetry and method responses
async fn handle_device(
    mut session: DeviceSession,
    sessions: Arc<SessionManager>,
    dispatcher: Arc<MethodDispatcher>,
) {
    match session.recv().await {
        Some(HubFrame::Hello { .. }) if !session.device_id().is_empty() => {}
        Some(other) => {
            warn!(addr = %session.addr(), frame = ?other, "expected hello, closing");
            return;
        }
        None => return,
    }

    let handle = session.get_handle();
    sessions.register(handle.clone()).await;
    let connected = sessions.count().await;
    info!(
        device = %handle.device_id,
        addr = %handle.addr,
        connected,
        "device connected"
    );

    while let Some(frame) = session.recv().await {
        match frame {
            HubFrame::Telemetry { device_id, body } => log_telemetry(&device_id, &body),
            HubFrame::MethodResponse(response) => {
                dispatcher.handle_response(&handle.device_id, response).await;
            }
            HubFrame::Hello { device_id } => {
                warn!(device = %handle.device_id, announced = %device_id, "repeated hello ignored");
            }
            HubFrame::MethodRequest(request) => {
                warn!(device = %handle.device_id, method = %request.method_name, "device sent a method request, ignored");
            }
        }
    }

    if sessions.unregister(&handle).await {
        dispatcher.fail_pending_for(&handle.device_id).await;
    }
    let connected = sessions.count().await;
    let pending = dispatcher.pending_count().await;
    info!(
        device = %handle.device_id,
        connected,
        pending,
        "device disconnected"
    );
}

fn log_telemetry(device_id: &str, body: &str) {
    match serde_json::from_str::<TelemetryMessage>(body) {
        Ok(message) => info!(
            device = %device_id,
            info_group = %message.info_group,
            measurements = %serde_json::Value::Object(message.measurements),
            "telemetry"
        ),
        Err(_) => info!(device = %device_id, %body, "telemetry (unstructured)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_shared::codec::{self, FrameDecoder};
    use greenhouse_shared::{MethodResponse, Payload, StatusCode};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start_hub() -> (String, Arc<SessionManager>, Arc<MethodDispatcher>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let sessions = Arc::new(SessionManager::new());
        let dispatcher = Arc::new(MethodDispatcher::new(sessions.clone()));
        tokio::spawn(serve_devices(listener, sessions.clone(), dispatcher.clone()));
        (addr, sessions, dispatcher)
    }

    async fn wait_connected(sessions: &SessionManager, id: &str) {
        for _ in 0..50 {
            if sessions.get(id).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{id} never registered");
    }

    #[tokio::test]
    async fn test_method_round_trip_over_device_link() {
        let (addr, sessions, dispatcher) = start_hub().await;

        let mut device = TcpStream::connect(&addr).await.unwrap();
        let hello = HubFrame::Hello {
            device_id: "Heater-1".into(),
        };
        device.write_all(&codec::encode(&hello).unwrap()).await.unwrap();
        wait_connected(&sessions, "Heater-1").await;

        let device_task = tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = vec![0u8; 1024];
            let request = loop {
                if let Some(HubFrame::MethodRequest(request)) = decoder.decode_next().unwrap() {
                    break request;
                }
                let n = device.read(&mut buf).await.unwrap();
                decoder.extend(&buf[..n]);
            };
            let mut payload = Payload::new();
            payload.insert("Method".into(), request.method_name.clone().into());
            let response = MethodResponse::new(request.request_id, StatusCode::Ok, payload);
            device
                .write_all(&codec::encode(&HubFrame::MethodResponse(response)).unwrap())
                .await
                .unwrap();
            device
        });

        let response = dispatcher
            .invoke("Heater-1", "turn_off", Payload::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.payload["Method"], "turn_off");
        assert_eq!(dispatcher.pending_count().await, 0);

        drop(device_task.await.unwrap());
        for _ in 0..50 {
            if sessions.count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session not removed after disconnect");
    }

    #[tokio::test]
    async fn test_first_frame_must_be_hello() {
        let (addr, sessions, _) = start_hub().await;

        let mut device = TcpStream::connect(&addr).await.unwrap();
        let telemetry = HubFrame::Telemetry {
            device_id: "AirSensor-1".into(),
            body: "{}".into(),
        };
        device.write_all(&codec::encode(&telemetry).unwrap()).await.unwrap();

        // The hub closes the link without registering anything.
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(1), device.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
        assert!(sessions.connected_devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let (addr, sessions, dispatcher) = start_hub().await;

        let mut device = TcpStream::connect(&addr).await.unwrap();
        let hello = HubFrame::Hello {
            device_id: "Irrigation-1".into(),
        };
        device.write_all(&codec::encode(&hello).unwrap()).await.unwrap();
        wait_connected(&sessions, "Irrigation-1").await;

        let result = dispatcher
            .invoke("Irrigation-1", "turn_on", Payload::new(), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(crate::command::DispatchError::Timeout { .. })));
        assert_eq!(dispatcher.pending_count().await, 0);

        let missing = dispatcher
            .invoke("Irrigation-9", "turn_on", Payload::new(), Duration::from_millis(50))
            .await;
        assert!(matches!(missing, Err(crate::command::DispatchError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_abandoned_invoke_leaves_nothing_pending() {
        let (addr, sessions, dispatcher) = start_hub().await;

        let mut device = TcpStream::connect(&addr).await.unwrap();
        let hello = HubFrame::Hello {
            device_id: "Heater-2".into(),
        };
        device.write_all(&codec::encode(&hello).unwrap()).await.unwrap();
        wait_connected(&sessions, "Heater-2").await;

        // The device never answers; the HTTP caller goes away instead.
        let caller = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .invoke("Heater-2", "turn_on", Payload::new(), Duration::from_secs(10))
                    .await
            })
        };
        for _ in 0..50 {
            if dispatcher.pending_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dispatcher.pending_count().await, 1);

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        for _ in 0..50 {
            if dispatcher.pending_count().await == 0 {
                // The link itself is still up.
                assert!(sessions.get("Heater-2").await.is_some());
                drop(device);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pending method outlived its caller");
    }
}
