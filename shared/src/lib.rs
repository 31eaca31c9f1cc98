//! Greenhouse Shared Protocol Types
//!
//! This crate provides the protocol types, connection descriptors, SAS token
//! signing and the frame codec shared by the edge device simulator, the local
//! hub emulator and the console.

pub mod codec;
pub mod descriptor;
pub mod protocol;
pub mod sas;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use descriptor::{ConnectionDescriptor, DescriptorError, HubCredentials};
pub use protocol::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Get current timestamp in whole seconds since Unix epoch
pub fn now_secs() -> u64 {
    now_ms() / 1000
}

/// Timing parameters for the system
pub mod timing {
    /// Poll timeout for method requests and shutdown checks
    pub const POLL_INTERVAL_MS: u64 = 100;

    /// Default telemetry interval for sensors
    pub const SENSOR_SEND_INTERVAL_SECS: u64 = 5;

    /// Default interval for controllers (no autonomous sends)
    pub const CONTROLLER_SEND_INTERVAL_SECS: u64 = 15;

    /// Lifetime of a freshly generated SAS token
    pub const TOKEN_TTL_SECS: u64 = 3600;

    /// A cached token must stay valid at least this long to be reused
    pub const TOKEN_MIN_REMAINING_SECS: u64 = 300;

    /// Default time a caller waits for a direct method response
    pub const METHOD_RESPONSE_TIMEOUT_SECS: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_helpers_agree() {
        let ms = now_ms();
        let secs = now_secs();
        assert!(ms > 0);
        assert!(secs >= ms / 1000);
    }

    #[test]
    fn test_poll_interval_shorter_than_send_intervals() {
        assert!(timing::POLL_INTERVAL_MS < timing::SENSOR_SEND_INTERVAL_SECS * 1000);
        assert!(timing::TOKEN_MIN_REMAINING_SECS < timing::TOKEN_TTL_SECS);
    }
}
