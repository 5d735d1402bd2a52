use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: Option<String>, to: String },

    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper function to create invalid transition errors
pub fn invalid_transition(from: impl ToString, event: impl std::fmt::Debug) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: Some(from.to_string()),
        to: format!("{event:?}"),
    }
}

/// Helper function to create guard failures
pub fn guard_failed(reason: impl Into<String>) -> StateMachineError {
    StateMachineError::GuardFailed {
        reason: reason.into(),
    }
}
