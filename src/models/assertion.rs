//! # Assertion
//!
//! The outcome of one expected-vs-actual check inside a step result.
//!
//! Built-in comparison types can be evaluated locally with
//! [`Assertion::evaluate`]; JSON path, XPath and custom assertions need an
//! external evaluator, which reports its verdict through [`Assertion::execute`].

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::severity::SeverityLevel;
use crate::ids::{IdGenerator, IdKind};
use crate::state_machine::AssertionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionType {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Regex,
    JsonPath,
    #[serde(rename = "xpath")]
    XPath,
    Custom,
}

impl AssertionType {
    /// Types whose verdict has to come from a collaborator
    pub fn needs_external_evaluator(&self) -> bool {
        matches!(self, Self::JsonPath | Self::XPath | Self::Custom)
    }
}

impl fmt::Display for AssertionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals => write!(f, "equals"),
            Self::NotEquals => write!(f, "not_equals"),
            Self::Contains => write!(f, "contains"),
            Self::NotContains => write!(f, "not_contains"),
            Self::Regex => write!(f, "regex"),
            Self::JsonPath => write!(f, "json_path"),
            Self::XPath => write!(f, "xpath"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for AssertionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "not_contains" => Ok(Self::NotContains),
            "regex" => Ok(Self::Regex),
            "json_path" | "jsonpath" => Ok(Self::JsonPath),
            "xpath" => Ok(Self::XPath),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Invalid assertion type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub step_result_id: String,
    pub name: String,
    pub assertion_type: AssertionType,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub source_path: Option<String>,
    pub target_element: Option<String>,
    pub status: AssertionState,
    pub severity: SeverityLevel,
    pub is_critical: bool,
    pub is_optional: bool,
    pub is_retryable: bool,
    pub error_message: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub supporting_data: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl Assertion {
    pub fn new(
        ids: &dyn IdGenerator,
        step_result_id: impl Into<String>,
        name: impl Into<String>,
        assertion_type: AssertionType,
        expected_value: Option<String>,
    ) -> Self {
        Self {
            id: ids.next_id(IdKind::Assertion),
            step_result_id: step_result_id.into(),
            name: name.into(),
            assertion_type,
            expected_value,
            actual_value: None,
            source_path: None,
            target_element: None,
            status: AssertionState::Pending,
            severity: SeverityLevel::Info,
            is_critical: false,
            is_optional: false,
            is_retryable: true,
            error_message: None,
            executed_at: None,
            supporting_data: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn critical(mut self, is_critical: bool) -> Self {
        self.is_critical = is_critical;
        self
    }

    pub fn optional(mut self, is_optional: bool) -> Self {
        self.is_optional = is_optional;
        self
    }

    pub fn retryable(mut self, is_retryable: bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    pub fn with_target_element(mut self, target_element: impl Into<String>) -> Self {
        self.target_element = Some(target_element.into());
        self
    }

    /// Record a verdict. A failed critical assertion escalates to CRITICAL.
    pub fn execute(&mut self, actual_value: impl Into<String>, passed: bool) {
        self.actual_value = Some(actual_value.into());
        self.executed_at = Some(Utc::now());
        self.status = if passed {
            AssertionState::Passed
        } else {
            AssertionState::Failed
        };

        if !passed && self.is_critical {
            self.severity = SeverityLevel::Critical;
        }
    }

    /// Compute the verdict for built-in comparison types.
    ///
    /// Returns `None` for types that need an external evaluator. An invalid
    /// regex pattern evaluates to `Some(false)`.
    pub fn evaluate(&self, actual: &str) -> Option<bool> {
        let expected = self.expected_value.as_deref().unwrap_or_default();
        let verdict = match self.assertion_type {
            AssertionType::Equals => actual == expected,
            AssertionType::NotEquals => actual != expected,
            AssertionType::Contains => actual.contains(expected),
            AssertionType::NotContains => !actual.contains(expected),
            AssertionType::Regex => Regex::new(expected)
                .map(|pattern| pattern.is_match(actual))
                .unwrap_or(false),
            AssertionType::JsonPath | AssertionType::XPath | AssertionType::Custom => {
                return None
            }
        };
        Some(verdict)
    }

    /// Evaluate locally and record the verdict. Returns `None` without touching
    /// the assertion when the type needs an external evaluator.
    pub fn check(&mut self, actual: &str) -> Option<AssertionState> {
        let passed = self.evaluate(actual)?;
        self.execute(actual, passed);
        Some(self.status)
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = AssertionState::Skipped;
        self.error_message = Some(reason.into());
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = AssertionState::Error;
        self.error_message = Some(message.into());
        self.executed_at = Some(Utc::now());
    }

    pub fn mark_timeout(&mut self) {
        self.status = AssertionState::Timeout;
        self.error_message = Some("Assertion evaluation timed out".to_string());
        self.executed_at = Some(Utc::now());
    }

    pub fn add_supporting_data(&mut self, data: impl Into<String>) {
        self.supporting_data.push(data.into());
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn is_passed(&self) -> bool {
        self.status == AssertionState::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == AssertionState::Failed
    }

    pub fn is_critical_failure(&self) -> bool {
        self.is_critical && self.is_failed()
    }
}
