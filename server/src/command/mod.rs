//! Direct method dispatch for the hub emulator
//!
//! This module handles:
//! - Forwarding method requests to connected devices
//! - Tracking pending requests until the device answers or the caller gives up

mod dispatcher;

pub use dispatcher::{DispatchError, MethodDispatcher};
