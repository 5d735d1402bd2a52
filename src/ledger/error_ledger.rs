//! # Error Ledger
//!
//! Append-only store of [`ErrorRecord`]s keyed by correlation id. Entries are
//! never removed; resolution and manual intervention mutate them in place.
//!
//! The ledger is shared between the orchestrator and the session coordinator
//! through cheap clones of the same handle.

use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::classifier::{FaultClassifier, FaultContext, StandardFaultClassifier};
use crate::config::LedgerConfig;
use crate::constants::{events, DEFAULT_MAX_RETRIES};
use crate::events::EventPublisher;
use crate::ids::SharedIdGenerator;
use crate::logging::log_fault;
use crate::metrics::telemetry;
use crate::models::{ErrorRecord, Evidence, FaultKind, LogLevel, SeverityLevel};
use crate::state_machine::ErrorKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No ledger entry with correlation id '{0}'")]
    NotFound(String),

    #[error("Ledger entry '{0}' is already resolved")]
    AlreadyResolved(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A fault as observed by the caller, before classification
#[derive(Debug, Clone, Default)]
pub struct FaultReport {
    pub message: String,
    pub fault_kind: FaultKind,
    pub error_kind: Option<ErrorKind>,
    pub session_id: Option<String>,
    pub step_id: Option<String>,
    pub source: Option<String>,
    pub evidence: Evidence,
    pub attempt_number: u32,
    pub max_attempts: u32,
}

impl FaultReport {
    pub fn new(message: impl Into<String>, fault_kind: FaultKind) -> Self {
        Self {
            message: message.into(),
            fault_kind,
            attempt_number: 1,
            max_attempts: DEFAULT_MAX_RETRIES + 1,
            ..Default::default()
        }
    }

    /// Fault raised by a step error; the fault kind follows the error kind
    pub fn from_error_kind(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            error_kind: Some(kind),
            ..Self::new(message, FaultKind::from(kind))
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

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_attempts(mut self, attempt_number: u32, max_attempts: u32) -> Self {
        self.attempt_number = attempt_number;
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Default)]
struct LedgerEntries {
    records: Vec<ErrorRecord>,
    by_correlation_id: HashMap<String, usize>,
}

impl LedgerEntries {
    fn get_mut(&mut self, correlation_id: &str) -> LedgerResult<&mut ErrorRecord> {
        let index = *self
            .by_correlation_id
            .get(correlation_id)
            .ok_or_else(|| LedgerError::NotFound(correlation_id.to_string()))?;
        Ok(&mut self.records[index])
    }
}

#[derive(Debug, Clone)]
pub struct ErrorLedger {
    entries: Arc<RwLock<LedgerEntries>>,
    classifier: Arc<dyn FaultClassifier>,
    ids: SharedIdGenerator,
    publisher: EventPublisher,
    auto_alert_severity: SeverityLevel,
}

impl ErrorLedger {
    pub fn new(ids: SharedIdGenerator, publisher: EventPublisher) -> Self {
        Self::from_config(&LedgerConfig::default(), ids, publisher)
    }

    pub fn from_config(config: &LedgerConfig, ids: SharedIdGenerator, publisher: EventPublisher) -> Self {
        Self {
            entries: Arc::new(RwLock::new(LedgerEntries::default())),
            classifier: Arc::new(StandardFaultClassifier::new()),
            ids,
            publisher,
            auto_alert_severity: config.auto_alert_severity,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FaultClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Classify a fault and append it. Returns the stored entry.
    ///
    /// Entries at or above the configured alert severity raise an alert.
    pub fn record_fault(&self, report: FaultReport) -> ErrorRecord {
        let mut context = FaultContext::new(report.attempt_number, report.max_attempts);
        if let Some(source) = &report.source {
            context = context.with_source(source.clone());
        }
        let classification = self.classifier.classify(report.fault_kind, &context);

        let mut record = ErrorRecord::new(
            self.ids.as_ref(),
            report.message,
            classification.log_level,
            report.fault_kind,
        )
        .with_error_code(classification.error_code)
        .with_evidence(report.evidence);
        record.session_id = report.session_id;
        record.step_id = report.step_id;
        record.source = report.source;
        record.error_kind = report.error_kind;
        record.is_recoverable = classification.is_recoverable;
        record.is_auto_recoverable = classification.is_auto_recoverable;
        record.requires_manual_intervention = classification.requires_manual_intervention;
        record.recovery_action = classification.recovery_action;
        record.retry_delay_ms = classification
            .retry_delay
            .map(|delay| delay.as_millis() as u64);

        self.append(record)
    }

    /// Append an already-built record
    pub fn append(&self, mut record: ErrorRecord) -> ErrorRecord {
        let raise_alert = record.severity >= self.auto_alert_severity;
        if raise_alert {
            record.trigger_alert(format!("Severity {} reached", record.severity));
        }

        log_fault(
            record.log_level,
            &record.correlation_id,
            record.session_id.as_deref(),
            record.step_id.as_deref(),
            &record.fault_kind.to_string(),
            &record.message,
        );
        telemetry::record_fault(record.log_level);

        {
            let mut entries = self.entries.write();
            let index = entries.records.len();
            entries
                .by_correlation_id
                .insert(record.correlation_id.clone(), index);
            entries.records.push(record.clone());
        }

        self.publisher.publish(
            events::FAULT_RECORDED,
            json!({
                "correlation_id": record.correlation_id,
                "session_id": record.session_id,
                "step_id": record.step_id,
                "log_level": record.log_level,
                "severity": record.severity,
            }),
        );
        if raise_alert {
            self.publish_alert(&record);
        }

        record
    }

    fn publish_alert(&self, record: &ErrorRecord) {
        self.publisher.publish(
            events::ALERT_RAISED,
            json!({
                "correlation_id": record.correlation_id,
                "session_id": record.session_id,
                "severity": record.severity,
                "message": record.message,
                "recovery_action": record.recovery_action,
            }),
        );
    }

    pub fn get(&self, correlation_id: &str) -> Option<ErrorRecord> {
        let entries = self.entries.read();
        entries
            .by_correlation_id
            .get(correlation_id)
            .map(|index| entries.records[*index].clone())
    }

    /// Entries for a session, in recording order
    pub fn for_session(&self, session_id: &str) -> Vec<ErrorRecord> {
        self.filtered(|record| record.session_id.as_deref() == Some(session_id))
    }

    pub fn for_step(&self, step_id: &str) -> Vec<ErrorRecord> {
        self.filtered(|record| record.step_id.as_deref() == Some(step_id))
    }

    fn filtered(&self, predicate: impl Fn(&ErrorRecord) -> bool) -> Vec<ErrorRecord> {
        self.entries
            .read()
            .records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    /// Any unresolved ERROR, FATAL or CRITICAL entry for the session
    pub fn has_blocking_entries(&self, session_id: &str) -> bool {
        self.entries.read().records.iter().any(|record| {
            record.session_id.as_deref() == Some(session_id) && record.is_blocking()
        })
    }

    pub fn mark_as_recovered(
        &self,
        correlation_id: &str,
        resolved_by: impl Into<String>,
        resolution: impl Into<String>,
    ) -> LedgerResult<ErrorRecord> {
        let record = {
            let mut entries = self.entries.write();
            let record = entries.get_mut(correlation_id)?;
            if record.is_resolved() {
                return Err(LedgerError::AlreadyResolved(correlation_id.to_string()));
            }
            record.mark_as_recovered(resolved_by, resolution);
            record.clone()
        };

        tracing::info!(
            correlation_id = %correlation_id,
            session_id = record.session_id.as_deref(),
            "Ledger entry recovered"
        );
        self.publisher.publish(
            events::FAULT_RECOVERED,
            json!({
                "correlation_id": record.correlation_id,
                "session_id": record.session_id,
            }),
        );
        Ok(record)
    }

    /// Flag an entry for a human. Session and step status are left alone.
    pub fn request_manual_intervention(
        &self,
        correlation_id: &str,
        reason: impl Into<String>,
    ) -> LedgerResult<ErrorRecord> {
        let record = {
            let mut entries = self.entries.write();
            let record = entries.get_mut(correlation_id)?;
            record.request_manual_intervention(reason);
            record.clone()
        };

        tracing::warn!(
            correlation_id = %correlation_id,
            recovery_action = record.recovery_action.as_deref(),
            "Manual intervention requested"
        );
        self.publish_alert(&record);
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.entries.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count entries per log level for a session
    pub fn level_counts(&self, session_id: &str) -> HashMap<LogLevel, usize> {
        let mut counts = HashMap::new();
        for record in self.for_session(session_id) {
            *counts.entry(record.log_level).or_insert(0) += 1;
        }
        counts
    }
}
