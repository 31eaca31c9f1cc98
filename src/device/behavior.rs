//! Send behaviors: how a device decides to push telemetry

use greenhouse_shared::TelemetryMessage;

/// Produces telemetry readings. Owned and driven by the send loop only.
pub trait TelemetrySource: Send + 'static {
    fn next_message(&mut self) -> TelemetryMessage;
}

/// Strategy of a device's send loop
pub enum SendBehavior {
    /// Push a reading whenever the identity's send interval has elapsed
    Periodic(Box<dyn TelemetrySource>),
    /// No autonomous sends; wait for shutdown
    Idle,
}

impl SendBehavior {
    pub fn periodic(source: impl TelemetrySource) -> Self {
        SendBehavior::Periodic(Box::new(source))
    }
}

impl std::fmt::Debug for SendBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendBehavior::Periodic(_) => write!(f, "Periodic"),
            SendBehavior::Idle => write!(f, "Idle"),
        }
    }
}
