//! Device runtime for simulated devices
//!
//! This module handles:
//! - The runtime lifecycle state machine
//! - Send behaviors (periodic telemetry or idle)
//! - The send and receive loops of a running device

mod behavior;
mod runtime;
pub mod state;

pub use behavior::{SendBehavior, TelemetrySource};
pub use runtime::{DeviceHandle, DeviceProfile, DeviceRuntime};

use crate::hub::HubError;
use thiserror::Error;

/// Why a device runtime ended abnormally
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Send path failed: {0}")]
    Send(#[from] HubError),

    #[error("Device task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
