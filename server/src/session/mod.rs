//! Session management for connected devices
//!
//! This module handles:
//! - Tracking the framed TCP session of each connected device
//! - Routing frames to a specific device by id

mod connection;
mod manager;

pub use connection::{DeviceSession, SessionHandle};
pub use manager::SessionManager;
