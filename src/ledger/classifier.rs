//! # Fault Classification
//!
//! Decides how a fault is logged and whether it can be recovered from, before
//! it is written to the ledger.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ FaultKind       │────▶│ FaultClassifier │────▶│ Classification  │
//! │ + Context       │     │ Strategy        │     │ (level, retry)  │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use campaign_core::ledger::{FaultClassifier, FaultContext, StandardFaultClassifier};
//! use campaign_core::models::{FaultKind, LogLevel};
//!
//! let classifier = StandardFaultClassifier::new();
//! let context = FaultContext::new(1, 3).with_source("owasp_provider");
//! let classification = classifier.classify(FaultKind::ExternalDependency, &context);
//!
//! assert_eq!(classification.log_level, LogLevel::Error);
//! assert!(classification.is_auto_recoverable);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{FaultKind, LogLevel};

/// Context information for fault classification
#[derive(Debug, Clone, Default)]
pub struct FaultContext {
    /// Current attempt number (1-based)
    pub attempt_number: u32,

    /// Maximum allowed attempts
    pub max_attempts: u32,

    /// Component where the fault originated
    pub source: Option<String>,
}

impl FaultContext {
    pub fn new(attempt_number: u32, max_attempts: u32) -> Self {
        Self {
            attempt_number,
            max_attempts,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_final_attempt(&self) -> bool {
        self.attempt_number >= self.max_attempts
    }
}

/// Result of fault classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultClassification {
    pub fault_kind: FaultKind,
    pub log_level: LogLevel,
    pub is_recoverable: bool,
    pub is_auto_recoverable: bool,
    pub requires_manual_intervention: bool,

    /// Recommended delay before retry (if auto-recoverable)
    pub retry_delay: Option<Duration>,

    /// Specific error code for tracking
    pub error_code: String,

    /// Suggested next action
    pub recovery_action: Option<String>,

    pub is_final_attempt: bool,
}

/// Trait for fault classification strategies
pub trait FaultClassifier: Send + Sync + std::fmt::Debug {
    fn classify(&self, fault_kind: FaultKind, context: &FaultContext) -> FaultClassification;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Configuration for classification behavior
#[derive(Debug, Clone)]
pub struct FaultClassifierConfig {
    /// Base retry delay for exponential backoff
    pub base_retry_delay: Duration,

    /// Maximum retry delay
    pub max_retry_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Base delay after a timeout
    pub timeout_retry_delay: Duration,

    /// Delay per attempt for unreachable dependencies
    pub dependency_retry_delay: Duration,
}

impl Default for FaultClassifierConfig {
    fn default() -> Self {
        Self {
            base_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(300), // 5 minutes
            backoff_multiplier: 2.0,
            timeout_retry_delay: Duration::from_secs(30),
            dependency_retry_delay: Duration::from_secs(5),
        }
    }
}

/// Standard classifier covering every [`FaultKind`]
#[derive(Debug, Clone, Default)]
pub struct StandardFaultClassifier {
    config: FaultClassifierConfig,
}

impl StandardFaultClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FaultClassifierConfig) -> Self {
        Self { config }
    }

    /// `base * multiplier^(attempt - 1)`, capped
    fn exponential_backoff(&self, base: Duration, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1).min(32) as i32;
        base.mul_f64(self.config.backoff_multiplier.powi(exponent))
            .min(self.config.max_retry_delay)
    }

    fn retry_delay(&self, fault_kind: FaultKind, attempt_number: u32) -> Duration {
        match fault_kind {
            FaultKind::Timeout => {
                self.exponential_backoff(self.config.timeout_retry_delay, attempt_number)
            }
            FaultKind::ExternalDependency => (self.config.dependency_retry_delay
                * attempt_number.max(1))
            .min(self.config.max_retry_delay),
            _ => self.exponential_backoff(self.config.base_retry_delay, attempt_number),
        }
    }
}

impl FaultClassifier for StandardFaultClassifier {
    fn classify(&self, fault_kind: FaultKind, context: &FaultContext) -> FaultClassification {
        let is_final_attempt = context.is_final_attempt();

        // (level, recoverable, retried automatically while attempts remain, code)
        let (mut log_level, is_recoverable, auto_retry, error_code) = match fault_kind {
            FaultKind::Timeout => (LogLevel::Error, true, true, "EXECUTION_TIMEOUT"),
            FaultKind::ExternalDependency => {
                (LogLevel::Error, true, true, "DEPENDENCY_UNAVAILABLE")
            }
            FaultKind::Execution => (LogLevel::Error, true, true, "EXECUTION_FAILURE"),
            FaultKind::Unknown => (LogLevel::Error, true, true, "UNKNOWN_FAULT"),
            FaultKind::Validation => (LogLevel::Warn, false, false, "VALIDATION_FAILURE"),
            FaultKind::Integration => (LogLevel::Error, true, false, "INTEGRATION_FAILURE"),
            FaultKind::Security => (LogLevel::Critical, false, false, "SECURITY_VIOLATION"),
            FaultKind::Configuration => (LogLevel::Fatal, false, false, "CONFIGURATION_ERROR"),
            FaultKind::System => (LogLevel::Critical, true, false, "SYSTEM_FAILURE"),
        };

        let is_auto_recoverable = auto_retry && !is_final_attempt;
        let retry_delay =
            is_auto_recoverable.then(|| self.retry_delay(fault_kind, context.attempt_number));

        // Out of attempts on something we would have retried: a human has to look
        if auto_retry && is_final_attempt {
            log_level = LogLevel::Fatal;
        }

        let requires_manual_intervention = matches!(
            fault_kind,
            FaultKind::Security | FaultKind::Configuration
        ) || (auto_retry && is_final_attempt)
            || (fault_kind == FaultKind::System && is_final_attempt);

        let recovery_action = if is_auto_recoverable {
            retry_delay.map(|delay| format!("Retry after {}ms", delay.as_millis()))
        } else if fault_kind == FaultKind::Validation {
            Some("Review the failed validation against the expected contract".to_string())
        } else {
            None
        };

        FaultClassification {
            fault_kind,
            log_level,
            is_recoverable,
            is_auto_recoverable,
            requires_manual_intervention,
            retry_delay,
            error_code: error_code.to_string(),
            recovery_action,
            is_final_attempt,
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardFaultClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_backs_off_exponentially() {
        let classifier = StandardFaultClassifier::new();

        let first = classifier.classify(FaultKind::Timeout, &FaultContext::new(1, 5));
        let third = classifier.classify(FaultKind::Timeout, &FaultContext::new(3, 5));

        assert_eq!(first.retry_delay, Some(Duration::from_secs(30)));
        assert_eq!(third.retry_delay, Some(Duration::from_secs(120)));
        assert_eq!(first.error_code, "EXECUTION_TIMEOUT");
        assert!(first.is_auto_recoverable);
        assert!(!first.requires_manual_intervention);
    }

    #[test]
    fn test_backoff_is_capped() {
        let classifier = StandardFaultClassifier::new();
        let late = classifier.classify(FaultKind::Execution, &FaultContext::new(30, 40));
        assert_eq!(late.retry_delay, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_final_attempt_needs_a_human() {
        let classifier = StandardFaultClassifier::new();
        let classification =
            classifier.classify(FaultKind::ExternalDependency, &FaultContext::new(3, 3));

        assert!(classification.is_final_attempt);
        assert!(!classification.is_auto_recoverable);
        assert!(classification.retry_delay.is_none());
        assert!(classification.requires_manual_intervention);
        assert_eq!(classification.log_level, LogLevel::Fatal);
    }

    #[test]
    fn test_security_faults_are_critical_and_manual() {
        let classifier = StandardFaultClassifier::new();
        let classification = classifier.classify(FaultKind::Security, &FaultContext::new(1, 3));

        assert_eq!(classification.log_level, LogLevel::Critical);
        assert!(!classification.is_recoverable);
        assert!(classification.requires_manual_intervention);
    }

    #[test]
    fn test_validation_faults_are_warnings() {
        let classifier = StandardFaultClassifier::new();
        let classification = classifier.classify(FaultKind::Validation, &FaultContext::new(1, 3));

        assert_eq!(classification.log_level, LogLevel::Warn);
        assert!(!classification.is_auto_recoverable);
        assert!(classification.recovery_action.is_some());
    }
}
