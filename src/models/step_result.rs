//! # Step Result
//!
//! Outcome of one scenario step: its lifecycle, the assertions evaluated
//! against it, the raw metrics reported by the collaborator and the cached
//! score set.

use serde::{Deserialize, Serialize};

use super::assertion::{Assertion, AssertionType};
use super::lifecycle::{Lifecycle, LifecycleResult};
use super::severity::SeverityLevel;
use crate::ids::{IdGenerator, IdKind};
use crate::metrics::{MetricsStore, ScoreSet, TestCounts};
use crate::state_machine::{ComparisonResult, ErrorKind, ExecutionState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub id: String,
    pub execution_id: String,
    pub step_id: String,
    pub step_name: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub comparison_result: ComparisonResult,
    pub expected_result: Option<String>,
    pub actual_result: Option<String>,
    assertions: Vec<Assertion>,
    has_critical_failure: bool,
    warnings: Vec<String>,
    pub metrics: MetricsStore,
    pub scores: ScoreSet,
}

impl StepResult {
    pub fn new(
        ids: &dyn IdGenerator,
        execution_id: impl Into<String>,
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: ids.next_id(IdKind::StepResult),
            execution_id: execution_id.into(),
            step_id: step_id.into(),
            step_name: step_name.into(),
            lifecycle: Lifecycle::new(max_retries),
            comparison_result: ComparisonResult::NotCompared,
            expected_result: None,
            actual_result: None,
            assertions: Vec::new(),
            has_critical_failure: false,
            warnings: Vec::new(),
            metrics: MetricsStore::new(),
            scores: ScoreSet::default(),
        }
    }

    pub fn status(&self) -> ExecutionState {
        self.lifecycle.state
    }

    pub fn severity(&self) -> SeverityLevel {
        self.lifecycle.severity
    }

    /// Severity the step can never drop below given what has been recorded
    fn severity_floor(&self) -> SeverityLevel {
        if self.has_critical_failure {
            SeverityLevel::Critical
        } else {
            self.metrics.severity_floor()
        }
    }

    pub fn start(&mut self) -> LifecycleResult<()> {
        self.lifecycle.start()
    }

    /// Finish with a verdict and refresh scores.
    pub fn complete(&mut self, success: bool) -> LifecycleResult<()> {
        let floor = self.severity_floor();
        self.lifecycle.complete(success, floor)?;
        self.refresh_scores();
        Ok(())
    }

    pub fn record_error(&mut self, message: impl Into<String>, kind: ErrorKind) -> ExecutionState {
        self.lifecycle.record_error(message, kind)
    }

    pub fn skip(&mut self, reason: impl Into<String>) -> LifecycleResult<()> {
        self.lifecycle.skip(reason)
    }

    pub fn cancel(&mut self) -> LifecycleResult<()> {
        self.lifecycle.cancel()
    }

    /// ERROR, TIMEOUT, or FAILED with at least one failed assertion
    pub fn is_retryable(&self) -> bool {
        self.lifecycle.is_retryable(self.has_failed_assertions())
    }

    pub fn can_retry(&self) -> bool {
        self.lifecycle.can_retry(self.has_failed_assertions())
    }

    /// Reset for another attempt.
    ///
    /// Assertions, the critical flag and the comparison outcome belong to the
    /// previous attempt and are cleared. Metrics and warnings are kept.
    pub fn retry(&mut self, reason: impl Into<String>) -> LifecycleResult<()> {
        let has_failed_assertions = self.has_failed_assertions();
        self.lifecycle.retry(reason, has_failed_assertions)?;
        self.assertions.clear();
        self.has_critical_failure = false;
        self.comparison_result = ComparisonResult::NotCompared;
        self.actual_result = None;
        Ok(())
    }

    /// Create an assertion owned by this step result. It still needs to be
    /// evaluated and handed back through [`record_assertion`](Self::record_assertion).
    pub fn new_assertion(
        &self,
        ids: &dyn IdGenerator,
        name: impl Into<String>,
        assertion_type: AssertionType,
        expected_value: Option<String>,
    ) -> Assertion {
        Assertion::new(ids, self.id.clone(), name, assertion_type, expected_value)
    }

    /// Attach an assertion. A failed critical assertion forces CRITICAL.
    pub fn record_assertion(&mut self, assertion: Assertion) {
        if assertion.is_critical_failure() {
            self.has_critical_failure = true;
            self.lifecycle.severity = SeverityLevel::Critical;
        }
        self.assertions.push(assertion);
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn assertion_ids(&self) -> Vec<&str> {
        self.assertions.iter().map(|a| a.id.as_str()).collect()
    }

    pub fn failed_assertion_ids(&self) -> Vec<&str> {
        self.assertions
            .iter()
            .filter(|a| a.is_failed())
            .map(|a| a.id.as_str())
            .collect()
    }

    pub fn passed_assertion_count(&self) -> usize {
        self.assertions.iter().filter(|a| a.is_passed()).count()
    }

    pub fn has_failed_assertions(&self) -> bool {
        self.assertions.iter().any(Assertion::is_failed)
    }

    pub fn has_critical_failure(&self) -> bool {
        self.has_critical_failure
    }

    pub fn record_comparison(
        &mut self,
        result: ComparisonResult,
        expected: Option<String>,
        actual: Option<String>,
    ) {
        self.comparison_result = result;
        self.expected_result = expected;
        self.actual_result = actual;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn set_test_counts(&mut self, tests: TestCounts) {
        self.metrics.set_test_counts(tests);
        self.refresh_scores();
    }

    pub fn add_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metrics.add_metric(key, value);
        self.refresh_scores();
    }

    pub fn add_performance_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metrics.add_performance_metric(key, value);
        self.refresh_scores();
    }

    pub fn add_security_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metrics.add_security_metric(key, value);
        self.refresh_scores();
    }

    pub fn add_quality_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metrics.add_quality_metric(key, value);
        self.refresh_scores();
    }

    pub fn add_validation_check(&mut self, check: impl Into<String>) {
        if self.metrics.add_validation_check(check) {
            self.refresh_scores();
        }
    }

    /// Escalates to at least HIGH; status is left alone.
    pub fn add_failed_validation(&mut self, validation: impl Into<String>) {
        if self.metrics.add_failed_validation(validation) {
            self.lifecycle.severity.escalate_to(SeverityLevel::High);
            self.refresh_scores();
        }
    }

    pub fn add_security_finding(&mut self, finding: impl Into<String>) {
        if self.metrics.add_security_finding(finding) {
            self.lifecycle.severity.escalate_to(SeverityLevel::High);
            self.refresh_scores();
        }
    }

    pub fn add_vulnerability(&mut self, vulnerability: impl Into<String>) {
        if self.metrics.add_vulnerability(vulnerability) {
            self.lifecycle.severity.escalate_to(SeverityLevel::Critical);
            self.refresh_scores();
        }
    }

    pub fn refresh_scores(&mut self) {
        self.scores = self.metrics.score_set();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGenerator;
    use crate::models::lifecycle::LifecycleError;
    use crate::state_machine::AssertionState;

    fn step(ids: &SequentialIdGenerator) -> StepResult {
        StepResult::new(ids, "execution-0", "openapi_parse", "Parse OpenAPI document", 3)
    }

    #[test]
    fn test_critical_assertion_keeps_step_critical_through_complete() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.start().unwrap();

        let mut assertion = result
            .new_assertion(&ids, "schema valid", AssertionType::Equals, Some("expected".into()))
            .critical(true);
        assertion.execute("expected", false);
        assert_eq!(assertion.status, AssertionState::Failed);
        result.record_assertion(assertion);
        assert_eq!(result.severity(), SeverityLevel::Critical);

        result.complete(false).unwrap();
        assert_eq!(result.status(), ExecutionState::Failed);
        assert_eq!(result.severity(), SeverityLevel::Critical);
        assert_eq!(result.failed_assertion_ids().len(), 1);
    }

    #[test]
    fn test_failed_step_without_failed_assertions_is_not_retryable() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.start().unwrap();
        result.complete(false).unwrap();

        assert!(!result.is_retryable());
        assert!(matches!(
            result.retry("flaky"),
            Err(LifecycleError::RetryNotAllowed { .. })
        ));
    }

    #[test]
    fn test_retry_clears_attempt_state() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.start().unwrap();
        result.add_performance_metric("latency_score", "80");

        let mut assertion =
            result.new_assertion(&ids, "status", AssertionType::Equals, Some("200".into()));
        assertion.execute("500", false);
        result.record_assertion(assertion);
        result.record_comparison(
            ComparisonResult::Mismatch,
            Some("200".into()),
            Some("500".into()),
        );
        result.complete(false).unwrap();
        assert!(result.can_retry());

        result.retry("upstream flake").unwrap();
        assert_eq!(result.status(), ExecutionState::Pending);
        assert!(result.lifecycle.is_retry_attempt);
        assert_eq!(result.lifecycle.retry_count, 1);
        assert!(result.assertions().is_empty());
        assert_eq!(result.comparison_result, ComparisonResult::NotCompared);
        assert!(result.lifecycle.started_at.is_none());
        assert_eq!(result.scores.performance_score, 80.0);
    }

    #[test]
    fn test_findings_escalate_without_changing_status() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.start().unwrap();

        result.add_failed_validation("missing required field");
        assert_eq!(result.severity(), SeverityLevel::High);
        assert_eq!(result.status(), ExecutionState::InProgress);

        result.add_vulnerability("A03:2021 injection");
        assert_eq!(result.severity(), SeverityLevel::Critical);

        // Success does not clear the escalation
        result.complete(true).unwrap();
        assert_eq!(result.status(), ExecutionState::Passed);
        assert_eq!(result.severity(), SeverityLevel::Critical);
    }

    #[test]
    fn test_record_error_is_critical_from_any_state() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.start().unwrap();
        result.complete(true).unwrap();

        let state = result.record_error("parser crashed", ErrorKind::Parsing);
        assert_eq!(state, ExecutionState::Error);
        assert_eq!(result.severity(), SeverityLevel::Critical);
        assert!(result.can_retry());
    }

    #[test]
    fn test_scores_follow_metrics() {
        let ids = SequentialIdGenerator::new();
        let mut result = step(&ids);
        result.set_test_counts(TestCounts::new(4, 3, 1, 0));
        result.add_validation_check("content-type");
        result.add_validation_check("content-type");
        result.add_security_metric("auth", "enforced");

        assert_eq!(result.scores.success_rate, 75.0);
        assert_eq!(result.scores.quality_score, 87.5);
        assert_eq!(result.scores.security_score, 100.0);
        assert_eq!(result.metrics.validation_checks.len(), 1);
    }
}
