//! # Execution Lifecycle
//!
//! Status, timing, severity and retry bookkeeping shared by [`Execution`] and
//! [`StepResult`]. Every status change is routed through
//! [`StepStateMachine::determine_target_state`]; this type adds the timestamp
//! and retry-budget rules on top of the bare transition table.
//!
//! [`Execution`]: super::Execution
//! [`StepResult`]: super::StepResult

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::severity::SeverityLevel;
use crate::state_machine::{
    ErrorKind, ExecutionState, StateMachineError, StepEvent, StepStateMachine,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] StateMachineError),

    #[error("Retry not allowed from {state} (attempt {retry_count} of {max_retries})")]
    RetryNotAllowed {
        state: ExecutionState,
        retry_count: u32,
        max_retries: u32,
    },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub state: ExecutionState,
    pub severity: SeverityLevel,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Only set once both timestamps exist
    pub duration_ms: Option<i64>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub is_retry_attempt: bool,
    pub retry_reason: Option<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl Lifecycle {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: ExecutionState::Pending,
            severity: SeverityLevel::Info,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            retry_count: 0,
            max_retries,
            is_retry_attempt: false,
            retry_reason: None,
            error_message: None,
            error_kind: None,
        }
    }

    fn apply(&mut self, event: StepEvent) -> LifecycleResult<ExecutionState> {
        let target = StepStateMachine::determine_target_state(self.state, &event)?;
        self.state = target;
        Ok(target)
    }

    fn stamp_completion(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0));
    }

    pub fn start(&mut self) -> LifecycleResult<()> {
        self.apply(StepEvent::Start)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Finish with a verdict.
    ///
    /// Severity becomes INFO on success and HIGH on failure, raised to
    /// `severity_floor` when the owner has already escalated past that.
    pub fn complete(&mut self, success: bool, severity_floor: SeverityLevel) -> LifecycleResult<()> {
        self.apply(StepEvent::Complete(success))?;
        self.stamp_completion();
        self.severity = if success {
            SeverityLevel::Info
        } else {
            SeverityLevel::High
        };
        self.severity.escalate_to(severity_floor);
        Ok(())
    }

    /// Record a hard error. Legal from any state, always CRITICAL.
    pub fn record_error(&mut self, message: impl Into<String>, kind: ErrorKind) -> ExecutionState {
        // RecordError has an edge from every state
        let target = match StepStateMachine::determine_target_state(
            self.state,
            &StepEvent::RecordError(kind),
        ) {
            Ok(target) => target,
            Err(_) if kind == ErrorKind::Timeout => ExecutionState::Timeout,
            Err(_) => ExecutionState::Error,
        };
        self.state = target;
        self.error_message = Some(message.into());
        self.error_kind = Some(kind);
        self.severity = SeverityLevel::Critical;
        self.stamp_completion();
        target
    }

    pub fn skip(&mut self, reason: impl Into<String>) -> LifecycleResult<()> {
        self.apply(StepEvent::Skip)?;
        self.error_message = Some(reason.into());
        self.stamp_completion();
        Ok(())
    }

    pub fn cancel(&mut self) -> LifecycleResult<()> {
        self.apply(StepEvent::Cancel)?;
        self.stamp_completion();
        Ok(())
    }

    /// ERROR and TIMEOUT are always retryable; FAILED only when the owner
    /// reports a failed child.
    pub fn is_retryable(&self, has_failed_children: bool) -> bool {
        match self.state {
            ExecutionState::Error | ExecutionState::Timeout => true,
            ExecutionState::Failed => has_failed_children,
            _ => false,
        }
    }

    pub fn can_retry(&self, has_failed_children: bool) -> bool {
        self.retry_count < self.max_retries && self.is_retryable(has_failed_children)
    }

    /// Reset to PENDING for another attempt. The caller re-invokes `start()`.
    pub fn retry(&mut self, reason: impl Into<String>, has_failed_children: bool) -> LifecycleResult<()> {
        if !self.can_retry(has_failed_children) {
            return Err(LifecycleError::RetryNotAllowed {
                state: self.state,
                retry_count: self.retry_count,
                max_retries: self.max_retries,
            });
        }

        self.apply(StepEvent::Retry)?;
        self.retry_count += 1;
        self.is_retry_attempt = true;
        self.retry_reason = Some(reason.into());
        self.started_at = None;
        self.completed_at = None;
        self.duration_ms = None;
        self.error_message = None;
        self.error_kind = None;
        self.severity = SeverityLevel::Info;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_MAX_RETRIES)
    }
}
