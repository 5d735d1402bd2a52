use serde::{Deserialize, Serialize};

use super::states::PipelinePhase;

/// Events that can trigger session state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Start the session
    Start,
    /// Enter an advisory pipeline phase
    EnterPhase(PipelinePhase),
    /// Finish the session; the flags feed the terminal status precedence
    Complete { success: bool, has_errors: bool },
    /// Cancel the session
    Cancel,
    /// Deadline expired
    Timeout,
    /// Reset a failed or errored session for another attempt
    Retry,
}

impl SessionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::EnterPhase(_) => "enter_phase",
            Self::Complete { .. } => "complete",
            Self::Cancel => "cancel",
            Self::Timeout => "timeout",
            Self::Retry => "retry",
        }
    }

    /// Check if this event moves the session into a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Cancel | Self::Timeout)
    }
}

/// Kind of error reported against an execution or step result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Assertion,
    Timeout,
    Network,
    Parsing,
    ExternalDependency,
    Llm,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assertion => "assertion_error",
            Self::Timeout => "timeout_error",
            Self::Network => "network_error",
            Self::Parsing => "parsing_error",
            Self::ExternalDependency => "external_dependency_error",
            Self::Llm => "llm_error",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that can trigger execution and step result transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepEvent {
    /// Begin running
    Start,
    /// Finish with a verdict
    Complete(bool),
    /// Record an error; wins over any in-flight success path
    RecordError(ErrorKind),
    /// Mark as not run
    Skip,
    /// Cancel the unit
    Cancel,
    /// Reset to pending for another attempt
    Retry,
}

impl StepEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::RecordError(_) => "record_error",
            Self::Skip => "skip",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete(_) | Self::RecordError(_) | Self::Skip | Self::Cancel
        )
    }
}
