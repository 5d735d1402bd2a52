//! Error types for the campaign core.
//!

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::ledger::LedgerError;
use crate::models::{LifecycleError, SessionError};
use crate::orchestration::CoordinatorError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CampaignError {
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Lifecycle error: {0}")]
    LifecycleError(String),
    #[error("Ledger error: {0}")]
    LedgerError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CampaignError {
    fn from(error: serde_json::Error) -> Self {
        CampaignError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<StateMachineError> for CampaignError {
    fn from(err: StateMachineError) -> Self {
        CampaignError::StateTransitionError(err.to_string())
    }
}

impl From<SessionError> for CampaignError {
    fn from(err: SessionError) -> Self {
        CampaignError::SessionError(err.to_string())
    }
}

impl From<LifecycleError> for CampaignError {
    fn from(err: LifecycleError) -> Self {
        CampaignError::LifecycleError(err.to_string())
    }
}

impl From<LedgerError> for CampaignError {
    fn from(err: LedgerError) -> Self {
        CampaignError::LedgerError(err.to_string())
    }
}

impl From<CoordinatorError> for CampaignError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Session(inner) => CampaignError::SessionError(inner.to_string()),
            other => CampaignError::OrchestrationError(other.to_string()),
        }
    }
}

impl From<ConfigurationError> for CampaignError {
    fn from(err: ConfigurationError) -> Self {
        CampaignError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CampaignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_convert_with_message() {
        let err: CampaignError = SessionError::UnknownStep {
            step_name: "bpmn_analysis".to_string(),
        }
        .into();

        assert_eq!(
            err.to_string(),
            "Session error: Step 'bpmn_analysis' was never added to the session"
        );
    }

    #[test]
    fn test_state_machine_errors_convert() {
        let err: CampaignError = StateMachineError::InvalidTransition {
            from: Some("completed".to_string()),
            to: "Start".to_string(),
        }
        .into();

        assert!(matches!(err, CampaignError::StateTransitionError(_)));
    }
}
