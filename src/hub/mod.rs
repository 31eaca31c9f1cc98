//! Hub transport layer
//!
//! This module handles:
//! - The client interface a device runtime uses to reach the hub
//! - A TCP link to the local hub emulator
//! - An in-memory hub for tests and offline runs

pub mod memory;
pub mod tcp;
pub mod traits;

pub use memory::MemoryHub;
pub use tcp::TcpHubConnector;
pub use traits::{HubConnector, HubTransport};

use greenhouse_shared::codec::CodecError;
use thiserror::Error;

/// Failures at the hub boundary
#[derive(Error, Debug)]
pub enum HubError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Telemetry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Hub link closed")]
    Disconnected,

    #[error("Hub rejected message: {0}")]
    Rejected(String),
}
