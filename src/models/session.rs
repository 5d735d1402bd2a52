//! # Orchestration Session
//!
//! Top-level record of one campaign run. The session owns the overall status,
//! the step counters reported by executions, the timing breakdown and the
//! retry bookkeeping. It is mutated only by its owner (the session
//! coordinator); everyone else reads snapshots.
//!
//! Status changes go through [`SessionStateMachine::determine_target_state`];
//! the guards that depend on session data (known step names, retry budget)
//! live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use super::severity::SeverityLevel;
use crate::ids::{retry_id, IdGenerator, IdKind};
use crate::metrics::{scoring, ScoreSet};
use crate::state_machine::{
    PipelinePhase, SessionEvent, SessionState, SessionStateMachine, StateMachineError, TimingPhase,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] StateMachineError),

    #[error("Step '{step_name}' was never added to the session")]
    UnknownStep { step_name: String },

    #[error("Step '{step_name}' has already completed")]
    StepAlreadyCompleted { step_name: String },

    #[error("Retry not allowed from {state} (attempt {retry_count} of {max_retries})")]
    RetryNotAllowed {
        state: SessionState,
        retry_count: u32,
        max_retries: u32,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One timestamped line of the session audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.to_rfc3339(), self.message)
    }
}

/// Wall-clock duration recorded for each timing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub preparation_ms: Option<i64>,
    pub execution_ms: Option<i64>,
    pub analysis_ms: Option<i64>,
    pub cleanup_ms: Option<i64>,
}

impl PhaseTimings {
    pub fn get(&self, phase: TimingPhase) -> Option<i64> {
        match phase {
            TimingPhase::Preparation => self.preparation_ms,
            TimingPhase::Execution => self.execution_ms,
            TimingPhase::Analysis => self.analysis_ms,
            TimingPhase::Cleanup => self.cleanup_ms,
        }
    }

    fn set(&mut self, phase: TimingPhase, duration_ms: i64) {
        let slot = match phase {
            TimingPhase::Preparation => &mut self.preparation_ms,
            TimingPhase::Execution => &mut self.execution_ms,
            TimingPhase::Analysis => &mut self.analysis_ms,
            TimingPhase::Cleanup => &mut self.cleanup_ms,
        };
        *slot = Some(duration_ms);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationSession {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: SessionState,
    pub severity: SeverityLevel,
    pub initiated_by: String,
    pub executed_by: String,
    pub environment: Option<String>,
    pub is_parallel_execution: bool,
    pub openapi_service_id: Option<String>,
    pub bpmn_process_id: Option<String>,
    pub owasp_categories: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timings: PhaseTimings,
    /// Only set once both `started_at` and `completed_at` exist
    pub total_duration_ms: Option<i64>,

    pub total_steps: u32,
    pub completed_steps: u32,
    pub passed_steps: u32,
    pub failed_steps: u32,
    pub error_steps: u32,
    pub skipped_steps: u32,

    step_names: Vec<String>,
    finished_steps: BTreeSet<String>,
    critical_errors: Vec<String>,
    ledger_correlation_ids: Vec<String>,
    warnings: Vec<String>,
    artifacts: Vec<String>,
    audit_log: Vec<AuditEntry>,

    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_of_session_id: Option<String>,

    pub scores: ScoreSet,
}

impl OrchestrationSession {
    pub fn new(
        ids: &dyn IdGenerator,
        name: impl Into<String>,
        initiated_by: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        let initiated_by = initiated_by.into();
        Self {
            id: ids.next_id(IdKind::Session),
            name: name.into(),
            description: None,
            status: SessionState::Pending,
            severity: SeverityLevel::Info,
            executed_by: initiated_by.clone(),
            initiated_by,
            environment: None,
            is_parallel_execution: false,
            openapi_service_id: None,
            bpmn_process_id: None,
            owasp_categories: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            timings: PhaseTimings::default(),
            total_duration_ms: None,
            total_steps: 0,
            completed_steps: 0,
            passed_steps: 0,
            failed_steps: 0,
            error_steps: 0,
            skipped_steps: 0,
            step_names: Vec::new(),
            finished_steps: BTreeSet::new(),
            critical_errors: Vec::new(),
            ledger_correlation_ids: Vec::new(),
            warnings: Vec::new(),
            artifacts: Vec::new(),
            audit_log: Vec::new(),
            retry_count: 0,
            max_retries,
            retry_of_session_id: None,
            scores: ScoreSet::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn parallel(mut self, is_parallel_execution: bool) -> Self {
        self.is_parallel_execution = is_parallel_execution;
        self
    }

    pub fn with_openapi_service(mut self, service_id: impl Into<String>) -> Self {
        self.openapi_service_id = Some(service_id.into());
        self
    }

    pub fn with_bpmn_process(mut self, process_id: impl Into<String>) -> Self {
        self.bpmn_process_id = Some(process_id.into());
        self
    }

    pub fn with_owasp_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owasp_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    fn audit(&mut self, message: impl Into<String>) {
        self.audit_log.push(AuditEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    fn transition(&mut self, event: SessionEvent) -> SessionResult<SessionState> {
        let target = SessionStateMachine::determine_target_state(self.status, &event)?;
        self.status = target;
        Ok(target)
    }

    fn stamp_completion(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.total_duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0));
    }

    pub fn start(&mut self) -> SessionResult<()> {
        self.transition(SessionEvent::Start)?;
        self.started_at = Some(Utc::now());
        self.audit(format!("Session started by: {}", self.initiated_by));
        Ok(())
    }

    /// Enter an advisory pipeline phase
    pub fn enter_phase(&mut self, phase: PipelinePhase) -> SessionResult<()> {
        self.transition(SessionEvent::EnterPhase(phase))?;
        self.audit(format!("Entered phase: {phase}"));
        Ok(())
    }

    pub fn record_timing(&mut self, phase: TimingPhase, duration_ms: i64) {
        self.timings.set(phase, duration_ms.max(0));
    }

    /// Register a step by name. Returns `false` if it was already registered.
    pub fn add_step(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.step_names.contains(&name) {
            return false;
        }
        self.audit(format!("Added step: {name}"));
        self.step_names.push(name);
        self.total_steps += 1;
        true
    }

    fn finish_step(&mut self, name: &str) -> SessionResult<()> {
        if !self.step_names.iter().any(|known| known == name) {
            return Err(SessionError::UnknownStep {
                step_name: name.to_string(),
            });
        }
        if !self.finished_steps.insert(name.to_string()) {
            return Err(SessionError::StepAlreadyCompleted {
                step_name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Count a registered step as passed or failed. Status is not changed.
    pub fn complete_step(&mut self, name: &str, success: bool) -> SessionResult<()> {
        self.finish_step(name)?;
        self.completed_steps += 1;
        if success {
            self.passed_steps += 1;
        } else {
            self.failed_steps += 1;
        }
        self.audit(format!(
            "Step completed: {name} - {}",
            if success { "PASSED" } else { "FAILED" }
        ));
        Ok(())
    }

    /// Count a registered step as not run
    pub fn skip_step(&mut self, name: &str) -> SessionResult<()> {
        self.finish_step(name)?;
        self.skipped_steps += 1;
        self.audit(format!("Step skipped: {name}"));
        Ok(())
    }

    /// Record a critical error. Idempotent by message; returns `false` for a
    /// message already recorded.
    ///
    /// `correlation_id` points at the ledger entry holding the full fault.
    pub fn add_error(&mut self, message: impl Into<String>, correlation_id: Option<String>) -> bool {
        let message = message.into();
        if self.critical_errors.contains(&message) {
            return false;
        }
        self.audit(format!("Critical error added: {message}"));
        self.critical_errors.push(message);
        if let Some(correlation_id) = correlation_id {
            self.ledger_correlation_ids.push(correlation_id);
        }
        self.error_steps += 1;
        self.severity = SeverityLevel::Critical;
        true
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) -> bool {
        let warning = warning.into();
        if self.warnings.contains(&warning) {
            return false;
        }
        self.audit(format!("Warning added: {warning}"));
        self.warnings.push(warning);
        true
    }

    pub fn add_artifact(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.artifacts.contains(&path) {
            return false;
        }
        self.artifacts.push(path);
        true
    }

    /// Finish the session.
    ///
    /// Terminal status precedence: any recorded error gives ERROR, otherwise
    /// `success` gives COMPLETED, otherwise FAILED.
    pub fn complete(&mut self, success: bool) -> SessionResult<SessionState> {
        let status = self.transition(SessionEvent::Complete {
            success,
            has_errors: self.error_steps > 0,
        })?;
        self.stamp_completion();

        match status {
            SessionState::Completed => self.severity = SeverityLevel::Info,
            SessionState::Failed => self.severity = SeverityLevel::Medium,
            _ => self.severity.escalate_to(SeverityLevel::High),
        }

        self.audit(format!("Session completed with status: {status}"));
        Ok(status)
    }

    pub fn cancel(&mut self) -> SessionResult<()> {
        self.transition(SessionEvent::Cancel)?;
        self.stamp_completion();
        self.audit("Session cancelled");
        Ok(())
    }

    /// Deadline expiry
    pub fn timeout(&mut self) -> SessionResult<()> {
        self.transition(SessionEvent::Timeout)?;
        self.stamp_completion();
        self.severity.escalate_to(SeverityLevel::High);
        self.audit("Session timed out");
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries && self.status.allows_retry()
    }

    /// Reset a FAILED or ERROR session for another attempt under a new id.
    ///
    /// Registered steps, warnings, artifacts and the audit log are kept.
    /// Timing, progress counters, recorded errors and their ledger correlation
    /// ids are cleared; the ledger itself keeps the entries.
    pub fn retry(&mut self, reason: impl Into<String>) -> SessionResult<()> {
        if !self.can_retry() {
            return Err(SessionError::RetryNotAllowed {
                state: self.status,
                retry_count: self.retry_count,
                max_retries: self.max_retries,
            });
        }

        self.transition(SessionEvent::Retry)?;
        self.retry_count += 1;
        let previous = std::mem::take(&mut self.id);
        self.id = retry_id(&previous, self.retry_count);
        self.retry_of_session_id = Some(previous);

        self.started_at = None;
        self.completed_at = None;
        self.total_duration_ms = None;
        self.timings = PhaseTimings::default();

        self.completed_steps = 0;
        self.passed_steps = 0;
        self.failed_steps = 0;
        self.error_steps = 0;
        self.skipped_steps = 0;
        self.finished_steps.clear();
        self.critical_errors.clear();
        self.ledger_correlation_ids.clear();
        self.severity = SeverityLevel::Info;
        self.scores = ScoreSet::default();

        self.audit(format!("Session retried due to: {}", reason.into()));
        Ok(())
    }

    /// Recompute the session score set from its own counters and the score
    /// sets of its executions.
    pub fn refresh_scores(&mut self, execution_scores: &[ScoreSet]) {
        self.scores = ScoreSet::aggregate(self.success_rate(), execution_scores);
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        self.status == SessionState::Completed && self.failed_steps == 0
    }

    pub fn has_errors(&self) -> bool {
        !self.critical_errors.is_empty() || self.error_steps > 0
    }

    /// `passed_steps / total_steps * 100`, 0 with no steps
    pub fn success_rate(&self) -> f64 {
        scoring::success_rate(self.passed_steps, self.total_steps)
    }

    pub fn completion_rate(&self) -> f64 {
        scoring::success_rate(self.completed_steps, self.total_steps)
    }

    pub fn step_names(&self) -> &[String] {
        &self.step_names
    }

    pub fn is_step_finished(&self, name: &str) -> bool {
        self.finished_steps.contains(name)
    }

    pub fn critical_errors(&self) -> &[String] {
        &self.critical_errors
    }

    pub fn ledger_correlation_ids(&self) -> &[String] {
        &self.ledger_correlation_ids
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }
}
