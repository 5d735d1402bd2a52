//! # Error Record
//!
//! A fault observed anywhere in a campaign, correlated to its session and step
//! by id. Raw payloads (stack traces, request and response bodies) stay on the
//! record as evidence; only counts and severity travel up the hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::severity::{LogLevel, SeverityLevel};
use crate::constants::system::MANUAL_INTERVENTION_PREFIX;
use crate::ids::{IdGenerator, IdKind};
use crate::state_machine::ErrorKind;

/// Broad category of an operational fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Timeout,
    ExternalDependency,
    Validation,
    Execution,
    Security,
    Integration,
    Configuration,
    System,
    #[default]
    Unknown,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ExternalDependency => write!(f, "external_dependency"),
            Self::Validation => write!(f, "validation"),
            Self::Execution => write!(f, "execution"),
            Self::Security => write!(f, "security"),
            Self::Integration => write!(f, "integration"),
            Self::Configuration => write!(f, "configuration"),
            Self::System => write!(f, "system"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<ErrorKind> for FaultKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Assertion => Self::Validation,
            ErrorKind::Timeout => Self::Timeout,
            ErrorKind::Network | ErrorKind::ExternalDependency | ErrorKind::Llm => {
                Self::ExternalDependency
            }
            ErrorKind::Parsing => Self::Integration,
            ErrorKind::Internal => Self::System,
        }
    }
}

/// Free-form diagnostic payload attached to a fault
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub stack_trace: Option<String>,
    pub request_data: Option<String>,
    pub response_data: Option<String>,
    pub endpoint: Option<String>,
    pub http_status: Option<u16>,
    pub context: Option<serde_json::Value>,
}

/// Who resolved a fault, how, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved_by: String,
    pub resolution: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub correlation_id: String,
    pub session_id: Option<String>,
    pub step_id: Option<String>,
    pub message: String,
    pub log_level: LogLevel,
    pub severity: SeverityLevel,
    pub fault_kind: FaultKind,
    pub error_kind: Option<ErrorKind>,
    pub source: Option<String>,
    pub error_code: Option<String>,
    pub evidence: Evidence,
    pub recorded_at: DateTime<Utc>,

    pub is_recoverable: bool,
    pub is_auto_recoverable: bool,
    pub requires_manual_intervention: bool,
    pub recovery_action: Option<String>,
    /// Suggested delay before retrying the faulted operation
    pub retry_delay_ms: Option<u64>,
    pub resolution: Option<Resolution>,
    pub alert_triggered: bool,

    pub related_correlation_ids: Vec<String>,
    pub properties: BTreeMap<String, String>,
    notes: Vec<String>,
}

impl ErrorRecord {
    pub fn new(
        ids: &dyn IdGenerator,
        message: impl Into<String>,
        log_level: LogLevel,
        fault_kind: FaultKind,
    ) -> Self {
        Self {
            correlation_id: ids.next_id(IdKind::Correlation),
            session_id: None,
            step_id: None,
            message: message.into(),
            log_level,
            severity: log_level.severity(),
            fault_kind,
            error_kind: None,
            source: None,
            error_code: None,
            evidence: Evidence::default(),
            recorded_at: Utc::now(),
            is_recoverable: false,
            is_auto_recoverable: false,
            requires_manual_intervention: false,
            recovery_action: None,
            retry_delay_ms: None,
            resolution: None,
            alert_triggered: false,
            related_correlation_ids: Vec::new(),
            properties: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// Change the log level, keeping severity in step with it
    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.log_level = log_level;
        self.severity = log_level.severity();
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(format!("[{}] {}", Utc::now().to_rfc3339(), note.into()));
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn add_related(&mut self, correlation_id: impl Into<String>) {
        let correlation_id = correlation_id.into();
        if !self.related_correlation_ids.contains(&correlation_id) {
            self.related_correlation_ids.push(correlation_id);
        }
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Demote to INFO and record who resolved the fault
    pub fn mark_as_recovered(&mut self, resolved_by: impl Into<String>, resolution: impl Into<String>) {
        let resolution = resolution.into();
        self.add_note(format!("Error recovered: {resolution}"));
        self.resolution = Some(Resolution {
            resolved_by: resolved_by.into(),
            resolution,
            resolved_at: Utc::now(),
        });
        self.set_log_level(LogLevel::Info);
    }

    /// Flag the fault for a human and raise its alert
    pub fn request_manual_intervention(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.requires_manual_intervention = true;
        self.recovery_action = Some(format!("{MANUAL_INTERVENTION_PREFIX}: {reason}"));
        self.alert_triggered = true;
        self.add_note(format!("Manual intervention requested: {reason}"));
    }

    pub fn trigger_alert(&mut self, alert_message: impl Into<String>) {
        self.alert_triggered = true;
        self.add_note(format!("Alert triggered: {}", alert_message.into()));
    }

    pub fn is_error(&self) -> bool {
        self.log_level.is_blocking()
    }

    pub fn is_warning(&self) -> bool {
        self.log_level == LogLevel::Warn
    }

    pub fn is_recoverable(&self) -> bool {
        self.is_recoverable || self.is_auto_recoverable
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn needs_attention(&self) -> bool {
        self.severity >= SeverityLevel::High
    }

    /// Unresolved ERROR, FATAL or CRITICAL entry
    pub fn is_blocking(&self) -> bool {
        self.is_error() && !self.is_resolved()
    }
}
