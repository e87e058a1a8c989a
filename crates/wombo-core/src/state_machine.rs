//! Pure state machine for a task's client-side lifecycle
//!
//! No I/O here: the poller feeds every status response in as an event and
//! acts on the resulting state.
//!
//! - Pure function: transition(state, event) -> state
//! - Terminal states absorb every further event
//! - Never panics

use crate::types::RemoteState;

/// Client-side view of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, no status seen yet
    Created,
    /// At least one status seen, result not ready
    Generating,
    /// Frames available and the service stopped generating
    Completed,
    /// The service reported failure or answered with garbage
    Failed { reason: String },
    /// Poll budget ran out first
    TimedOut,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed { .. } | TaskState::TimedOut
        )
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A well-formed status response
    StatusReceived { state: RemoteState, frames: usize },
    /// Status response that could not be understood, or an error status
    Malformed { reason: String },
    /// The poll deadline passed
    BudgetExhausted,
}

/// Pure state transition function
pub fn transition(state: TaskState, event: TaskEvent) -> TaskState {
    if state.is_terminal() {
        return state;
    }

    match event {
        TaskEvent::StatusReceived {
            state: RemoteState::Failed,
            ..
        } => TaskState::Failed {
            reason: "service reported state 'failed'".to_string(),
        },
        TaskEvent::StatusReceived { state, frames } => {
            if frames > 0 && state != RemoteState::Generating {
                TaskState::Completed
            } else {
                TaskState::Generating
            }
        }
        TaskEvent::Malformed { reason } => TaskState::Failed { reason },
        TaskEvent::BudgetExhausted => TaskState::TimedOut,
    }
}
