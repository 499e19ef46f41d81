//! Engine lifecycle state machine.
//!
//! BOOT → RUN ⇄ STOP, RUN → FAULT → STOP
//!
//! FAULT is entered only by resource-exhaustion faults detected during a
//! scan (runaway jump loop, call-stack overflow). Leaving it requires an
//! explicit acknowledge to STOP.

use crate::error::{LadderError, LadderResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the ladder engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    /// Tables allocated, never started.
    #[default]
    Boot,
    /// Cyclic scanning.
    Run,
    /// Stopped by the operator; outputs keep their last values.
    Stop,
    /// Stopped by the engine after a resource-exhaustion fault.
    Fault,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot => write!(f, "BOOT"),
            Self::Run => write!(f, "RUN"),
            Self::Stop => write!(f, "STOP"),
            Self::Fault => write!(f, "FAULT"),
        }
    }
}

impl EngineState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: EngineState) -> bool {
        use EngineState::{Boot, Fault, Run, Stop};

        matches!(
            (self, target),
            (Boot, Run) | (Boot, Stop) | (Run, Stop) | (Stop, Run) | (Run, Fault) | (Fault, Stop)
        )
    }

    /// Returns true if scans are executed in this state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Run)
    }

    /// Returns true if the engine is halted (operator stop or fault).
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stop | Self::Fault)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: EngineState,
    previous: Option<EngineState>,
    transition_count: u64,
}

impl StateMachine {
    /// Create a new state machine starting in BOOT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<EngineState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: EngineState) -> LadderResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(LadderError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Force a transition to FAULT (no-op unless currently running).
    pub fn enter_fault(&mut self) {
        if self.current.can_transition_to(EngineState::Fault) {
            self.previous = Some(self.current);
            self.current = EngineState::Fault;
            self.transition_count += 1;
        }
    }
}
