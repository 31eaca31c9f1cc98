//! Device Runtime State Machine
//!
//! Defines the lifecycle of a runtime and which transitions are valid.

use std::fmt;

/// Lifecycle states of a device runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeState {
    /// Built, loops not started
    #[default]
    Created,
    /// Send and receive loops active
    Running,
    /// Shutdown observed, loops finishing their current poll
    ShuttingDown,
    /// Both loops returned
    Stopped,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Created => "created",
            RuntimeState::Running => "running",
            RuntimeState::ShuttingDown => "shutting-down",
            RuntimeState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Loops spawned
    Started,
    /// Shared shutdown signal observed
    ShutdownObserved,
    /// Both loops joined
    LoopsJoined,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(RuntimeState),
    /// Event repeated in a state that already reflects it
    Unchanged(RuntimeState),
    /// Transition was invalid from current state
    Invalid { from: RuntimeState, event: RuntimeEvent },
}

/// Tracks the lifecycle of one runtime
#[derive(Debug, Default)]
pub struct RuntimeStateMachine {
    current_state: RuntimeState,
}

impl RuntimeStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RuntimeState {
        self.current_state
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: RuntimeEvent) -> TransitionResult {
        use RuntimeEvent::*;
        use RuntimeState::*;

        let next = match (self.current_state, event) {
            (Created, Started) => Running,
            (Running, ShutdownObserved) => ShuttingDown,
            // Both loops report the signal; the second report is a no-op.
            (ShuttingDown, ShutdownObserved) => return TransitionResult::Unchanged(ShuttingDown),
            // Loops may also end on their own (send path failure) before shutdown.
            (Running | ShuttingDown, LoopsJoined) => Stopped,
            (from, event) => return TransitionResult::Invalid { from, event },
        };

        self.current_state = next;
        TransitionResult::Success(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = RuntimeStateMachine::new();
        assert_eq!(fsm.state(), RuntimeState::Created);
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut fsm = RuntimeStateMachine::new();

        let result = fsm.process_event(RuntimeEvent::Started);
        assert_eq!(result, TransitionResult::Success(RuntimeState::Running));

        let result = fsm.process_event(RuntimeEvent::ShutdownObserved);
        assert_eq!(result, TransitionResult::Success(RuntimeState::ShuttingDown));

        let result = fsm.process_event(RuntimeEvent::ShutdownObserved);
        assert_eq!(result, TransitionResult::Unchanged(RuntimeState::ShuttingDown));

        let result = fsm.process_event(RuntimeEvent::LoopsJoined);
        assert_eq!(result, TransitionResult::Success(RuntimeState::Stopped));
    }

    #[test]
    fn test_cannot_restart_stopped_runtime() {
        let mut fsm = RuntimeStateMachine::new();
        fsm.process_event(RuntimeEvent::Started);
        fsm.process_event(RuntimeEvent::LoopsJoined);

        let result = fsm.process_event(RuntimeEvent::Started);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), RuntimeState::Stopped);
    }

    #[test]
    fn test_shutdown_before_start_is_invalid() {
        let mut fsm = RuntimeStateMachine::new();
        let result = fsm.process_event(RuntimeEvent::ShutdownObserved);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), RuntimeState::Created);
    }
}
