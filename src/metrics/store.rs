//! # Metrics Store
//!
//! Raw metric collections owned by an execution or step result. Collaborators
//! feed opaque key/value pairs and finding strings in; [`MetricsStore::score_set`]
//! turns them into a [`ScoreSet`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::scoring::{self, ScoreSet};
use crate::models::SeverityLevel;

/// Test counts reported by a collaborator for one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestCounts {
    pub fn new(total: u32, passed: u32, failed: u32, skipped: u32) -> Self {
        Self {
            total,
            passed,
            failed,
            skipped,
        }
    }

    pub fn success_rate(&self) -> f64 {
        scoring::success_rate(self.passed, self.total)
    }
}

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) -> bool {
    let value = value.into();
    if list.contains(&value) {
        false
    } else {
        list.push(value);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsStore {
    pub tests: TestCounts,
    pub validation_checks: Vec<String>,
    pub failed_validations: Vec<String>,
    pub metrics: BTreeMap<String, String>,
    pub performance_metrics: BTreeMap<String, String>,
    pub security_metrics: BTreeMap<String, String>,
    pub quality_metrics: BTreeMap<String, String>,
    pub security_findings: Vec<String>,
    pub vulnerabilities: Vec<String>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_test_counts(&mut self, tests: TestCounts) {
        self.tests = tests;
    }

    pub fn add_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metrics.insert(key.into(), value.into());
    }

    pub fn add_performance_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.performance_metrics.insert(key.into(), value.into());
    }

    /// Each security metric counts as one security check
    pub fn add_security_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.security_metrics.insert(key.into(), value.into());
    }

    pub fn add_quality_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.quality_metrics.insert(key.into(), value.into());
    }

    /// Returns `false` when the check was already recorded
    pub fn add_validation_check(&mut self, check: impl Into<String>) -> bool {
        push_unique(&mut self.validation_checks, check)
    }

    pub fn add_failed_validation(&mut self, validation: impl Into<String>) -> bool {
        push_unique(&mut self.failed_validations, validation)
    }

    pub fn add_security_finding(&mut self, finding: impl Into<String>) -> bool {
        push_unique(&mut self.security_findings, finding)
    }

    pub fn add_vulnerability(&mut self, vulnerability: impl Into<String>) -> bool {
        push_unique(&mut self.vulnerabilities, vulnerability)
    }

    pub fn has_security_findings(&self) -> bool {
        !self.security_findings.is_empty() || !self.vulnerabilities.is_empty()
    }

    /// Lowest severity the recorded findings allow: CRITICAL with any
    /// vulnerability, HIGH with a failed validation or security finding.
    pub fn severity_floor(&self) -> SeverityLevel {
        if !self.vulnerabilities.is_empty() {
            SeverityLevel::Critical
        } else if !self.failed_validations.is_empty() || !self.security_findings.is_empty() {
            SeverityLevel::High
        } else {
            SeverityLevel::Info
        }
    }

    pub fn performance_score(&self) -> f64 {
        scoring::performance_score(self.performance_metrics.values().map(String::as_str))
    }

    pub fn security_score(&self) -> f64 {
        scoring::security_score(
            self.security_metrics.len(),
            self.security_findings.len(),
            self.vulnerabilities.len(),
        )
    }

    pub fn validation_pass_rate(&self) -> f64 {
        scoring::validation_pass_rate(self.validation_checks.len(), self.failed_validations.len())
    }

    /// Zero when no tests were recorded
    pub fn quality_score(&self) -> f64 {
        self.quality_score_for(self.tests)
    }

    fn quality_score_for(&self, tests: TestCounts) -> f64 {
        if tests.total == 0 {
            return 0.0;
        }
        scoring::quality_score(tests.success_rate(), self.validation_pass_rate())
    }

    /// Scores computed from the stored collections, using `tests` for the
    /// success and quality components.
    pub fn score_set(&self) -> ScoreSet {
        self.score_set_with_tests(self.tests)
    }

    /// Same as [`score_set`](Self::score_set) with externally derived test counts
    pub fn score_set_with_tests(&self, tests: TestCounts) -> ScoreSet {
        ScoreSet::from_components(
            tests.success_rate(),
            self.quality_score_for(tests),
            self.security_score(),
            self.performance_score(),
        )
    }
}
