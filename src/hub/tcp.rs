//! TCP link to the local hub emulator

use super::traits::{HubConnector, HubTransport};
use super::HubError;
use async_trait::async_trait;
use bytes::Bytes;
use greenhouse_shared::codec::{self, FrameDecoder, HubFrame};
use greenhouse_shared::{DeviceIdentity, MethodRequest, MethodResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Connects each device over its own TCP stream
pub struct TcpHubConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpHubConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl HubConnector for TcpHubConnector {
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Arc<dyn HubTransport>, HubError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(result) => result?,
            Err(_) => return Err(HubError::ConnectTimeout(self.address.clone())),
        };
        stream.set_nodelay(true)?;

        let link = TcpHubLink::open(identity.id(), stream).await?;
        Ok(Arc::new(link))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// A device's framed connection to the hub emulator
pub struct TcpHubLink {
    device_id: String,
    writer: Mutex<OwnedWriteHalf>,
    requests: Mutex<mpsc::Receiver<MethodRequest>>,
    reader_task: JoinHandle<()>,
}

impl TcpHubLink {
    /// Announce the device and start reading frames from the hub
    pub async fn open(device_id: &str, stream: TcpStream) -> Result<Self, HubError> {
        let (reader, mut writer) = stream.into_split();

        let hello = codec::encode(&HubFrame::Hello {
            device_id: device_id.to_string(),
        })?;
        writer.write_all(&hello).await?;

        let (request_tx, request_rx) = mpsc::channel(32);
        let reader_task = tokio::spawn(read_frames(device_id.to_string(), reader, request_tx));

        Ok(Self {
            device_id: device_id.to_string(),
            writer: Mutex::new(writer),
            requests: Mutex::new(request_rx),
            reader_task,
        })
    }

    async fn write_frame(&self, frame: &HubFrame) -> Result<(), HubError> {
        let encoded = codec::encode(frame)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        Ok(())
    }
}

impl Drop for TcpHubLink {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[async_trait]
impl HubTransport for TcpHubLink {
    async fn send_telemetry(&self, device_id: &str, message: Bytes) -> Result<(), HubError> {
        let body = String::from_utf8(message.to_vec())
            .map_err(|_| HubError::Rejected("telemetry is not UTF-8".into()))?;
        self.write_frame(&HubFrame::Telemetry {
            device_id: device_id.to_string(),
            body,
        })
        .await
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
        self.write_frame(&HubFrame::MethodResponse(response)).await
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        self.reader_task.abort();
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        debug!(device = %self.device_id, "hub link closed");
        Ok(())
    }
}

/// Forward method requests from the hub until the stream ends
async fn read_frames(
    device_id: String,
    mut reader: OwnedReadHalf,
    request_tx: mpsc::Sender<MethodRequest>,
) {
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) => {
                warn!(device = %device_id, "hub closed connection");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(device = %device_id, error = %e, "hub read error");
                return;
            }
        };
        decoder.extend(&read_buf[..n]);

        loop {
            match decoder.decode_next() {
                Ok(Some(HubFrame::MethodRequest(request))) => {
                    if request_tx.send(request).await.is_err() {
                        return;
                    }
                }
                Ok(Some(other)) => {
                    debug!(device = %device_id, frame = ?other, "ignoring unexpected frame");
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(device = %device_id, error = %e, "dropping hub link after bad frame");
                    return;
                }
            }
        }
    }
}
