//! Individual device session handling

use anyhow::Result;
use greenhouse_shared::codec::{self, FrameDecoder, HubFrame};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::warn;

/// Handle to send frames to a specific device
#[derive(Clone)]
pub struct SessionHandle {
    pub device_id: String,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    writer: Arc<Mutex<WriteHalf<TcpStream>>>,
}

impl SessionHandle {
    /// Send a frame to this device
    pub async fn send(&self, frame: &HubFrame) -> Result<()> {
        let encoded = codec::encode(frame)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        Ok(())
    }
}

/// Active device session
pub struct DeviceSession {
    handle: SessionHandle,
    reader: ReadHalf<TcpStream>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl DeviceSession {
    /// Create a session from a freshly accepted TCP stream
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        let handle = SessionHandle {
            device_id: String::new(), // set by the Hello frame
            addr,
            connected_at: Instant::now(),
            writer: Arc::new(Mutex::new(writer)),
        };

        Self {
            handle,
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }

    /// Get a cloneable handle for sending frames
    pub fn get_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the next frame from this session.
    /// Returns None once the connection is closed or unreadable.
    pub async fn recv(&mut self) -> Option<HubFrame> {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(frame)) => {
                    if let HubFrame::Hello { ref device_id } = frame {
                        if self.handle.device_id.is_empty() {
                            self.handle.device_id = device_id.clone();
                        }
                    }
                    return Some(frame);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(addr = %self.handle.addr, error = %e, "decode error");
                    return None;
                }
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => return None,
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    warn!(addr = %self.handle.addr, error = %e, "read error");
                    return None;
                }
            }
        }
    }

    /// Device id announced by the Hello frame, empty before it
    pub fn device_id(&self) -> &str {
        &self.handle.device_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr
    }
}
