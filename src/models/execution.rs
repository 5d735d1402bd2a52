//! # Execution
//!
//! One run of a test scenario. Step counters are derived from the latest
//! recorded outcome of each registered step, so a retried step replaces its
//! previous outcome instead of being counted twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lifecycle::{Lifecycle, LifecycleResult};
use super::severity::SeverityLevel;
use super::step_result::StepResult;
use crate::ids::{retry_id, IdGenerator, IdKind};
use crate::metrics::{scoring, MetricsStore, ScoreSet, TestCounts};
use crate::state_machine::{ErrorKind, ExecutionState};

/// Latest outcome of one step inside an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_result_id: Option<String>,
    pub status: ExecutionState,
    pub severity: SeverityLevel,
    pub error_kind: Option<ErrorKind>,
    pub total_assertions: u32,
    pub passed_assertions: u32,
    pub failed_assertions: u32,
}

impl StepOutcome {
    fn pending() -> Self {
        Self {
            step_result_id: None,
            status: ExecutionState::Pending,
            severity: SeverityLevel::Info,
            error_kind: None,
            total_assertions: 0,
            passed_assertions: 0,
            failed_assertions: 0,
        }
    }

    fn from_result(result: &StepResult) -> Self {
        Self {
            step_result_id: Some(result.id.clone()),
            status: result.status(),
            severity: result.severity(),
            error_kind: result.lifecycle.error_kind,
            total_assertions: result.assertions().len() as u32,
            passed_assertions: result.passed_assertion_count() as u32,
            failed_assertions: result.failed_assertion_ids().len() as u32,
        }
    }
}

/// Step counters derived from the recorded outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    /// ERROR and TIMEOUT
    pub error: u32,
    /// SKIPPED and CANCELLED
    pub skipped: u32,
}

impl StepCounts {
    pub fn completed(&self) -> u32 {
        self.passed + self.failed + self.error + self.skipped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub session_id: String,
    pub scenario_id: String,
    pub scenario_name: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub retry_of_execution_id: Option<String>,
    steps: BTreeMap<String, StepOutcome>,
    warnings: Vec<String>,
    pub metrics: MetricsStore,
    pub scores: ScoreSet,
}

impl Execution {
    pub fn new(
        ids: &dyn IdGenerator,
        session_id: impl Into<String>,
        scenario_id: impl Into<String>,
        scenario_name: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: ids.next_id(IdKind::Execution),
            session_id: session_id.into(),
            scenario_id: scenario_id.into(),
            scenario_name: scenario_name.into(),
            lifecycle: Lifecycle::new(max_retries),
            retry_of_execution_id: None,
            steps: BTreeMap::new(),
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

    /// Register a step as part of this execution. Idempotent.
    pub fn register_step(&mut self, step_id: impl Into<String>) {
        self.steps
            .entry(step_id.into())
            .or_insert_with(StepOutcome::pending);
    }

    /// Record the latest outcome of a step, registering it if needed.
    pub fn record_step_result(&mut self, result: &StepResult) {
        self.steps
            .insert(result.step_id.clone(), StepOutcome::from_result(result));
        self.refresh_scores();
    }

    pub fn step_outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.steps.get(step_id)
    }

    pub fn step_counts(&self) -> StepCounts {
        self.steps
            .values()
            .fold(StepCounts::default(), |mut counts, outcome| {
                counts.total += 1;
                match outcome.status {
                    ExecutionState::Passed => counts.passed += 1,
                    ExecutionState::Failed => counts.failed += 1,
                    ExecutionState::Error | ExecutionState::Timeout => counts.error += 1,
                    ExecutionState::Skipped | ExecutionState::Cancelled => counts.skipped += 1,
                    ExecutionState::Pending | ExecutionState::InProgress => {}
                }
                counts
            })
    }

    /// `(total, passed, failed)` assertions across the latest step outcomes
    pub fn assertion_counts(&self) -> (u32, u32, u32) {
        self.steps.values().fold((0, 0, 0), |(total, passed, failed), o| {
            (
                total + o.total_assertions,
                passed + o.passed_assertions,
                failed + o.failed_assertions,
            )
        })
    }

    /// `passed_steps / total_steps * 100`, 0 with no steps
    pub fn success_rate(&self) -> f64 {
        let counts = self.step_counts();
        scoring::success_rate(counts.passed, counts.total)
    }

    pub fn start(&mut self) -> LifecycleResult<()> {
        self.lifecycle.start()
    }

    pub fn complete(&mut self, success: bool) -> LifecycleResult<()> {
        let floor = self.severity_floor();
        self.lifecycle.complete(success, floor)?;
        self.refresh_scores();
        Ok(())
    }

    /// Derive the terminal status from the recorded step outcomes: any errored
    /// step makes the execution ERROR, else any failed step makes it FAILED,
    /// else it PASSED.
    pub fn finalize(&mut self) -> LifecycleResult<ExecutionState> {
        let counts = self.step_counts();

        if counts.error > 0 {
            let kind = self
                .steps
                .values()
                .find(|o| o.status.is_error())
                .and_then(|o| o.error_kind)
                .unwrap_or(ErrorKind::Internal);
            let state = self.record_error(format!("{} step(s) ended in error", counts.error), kind);
            self.refresh_scores();
            return Ok(state);
        }

        self.complete(counts.failed == 0)?;
        Ok(self.status())
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

    pub fn has_failed_steps(&self) -> bool {
        self.step_counts().failed > 0
    }

    /// ERROR, TIMEOUT, or FAILED with at least one failed step
    pub fn is_retryable(&self) -> bool {
        self.lifecycle.is_retryable(self.has_failed_steps())
    }

    pub fn can_retry(&self) -> bool {
        self.lifecycle.can_retry(self.has_failed_steps())
    }

    /// Start a new attempt of this execution.
    ///
    /// The attempt gets the id `{original}_retry_{n}` and keeps the id it
    /// replaces in `retry_of_execution_id`. Step outcomes are kept so steps
    /// that are not re-run still count.
    pub fn retry(&mut self, reason: impl Into<String>) -> LifecycleResult<()> {
        let has_failed_steps = self.has_failed_steps();
        self.lifecycle.retry(reason, has_failed_steps)?;

        let previous = std::mem::take(&mut self.id);
        self.id = retry_id(&previous, self.lifecycle.retry_count);
        self.retry_of_execution_id = Some(previous);
        Ok(())
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

    /// Fold a step's raw metrics into the execution, keyed by step id.
    pub fn merge_step_metrics(&mut self, step_id: &str, step_metrics: &MetricsStore) {
        let prefixed = |key: &String| format!("{step_id}.{key}");

        for (key, value) in &step_metrics.metrics {
            self.metrics.add_metric(prefixed(key), value.clone());
        }
        for (key, value) in &step_metrics.performance_metrics {
            self.metrics.add_performance_metric(prefixed(key), value.clone());
        }
        for (key, value) in &step_metrics.security_metrics {
            self.metrics.add_security_metric(prefixed(key), value.clone());
        }
        for (key, value) in &step_metrics.quality_metrics {
            self.metrics.add_quality_metric(prefixed(key), value.clone());
        }
        for check in &step_metrics.validation_checks {
            self.metrics.add_validation_check(check.clone());
        }
        for validation in &step_metrics.failed_validations {
            if self.metrics.add_failed_validation(validation.clone()) {
                self.lifecycle.severity.escalate_to(SeverityLevel::High);
            }
        }
        for finding in &step_metrics.security_findings {
            if self.metrics.add_security_finding(finding.clone()) {
                self.lifecycle.severity.escalate_to(SeverityLevel::High);
            }
        }
        for vulnerability in &step_metrics.vulnerabilities {
            if self.metrics.add_vulnerability(vulnerability.clone()) {
                self.lifecycle.severity.escalate_to(SeverityLevel::Critical);
            }
        }
        self.refresh_scores();
    }

    fn severity_floor(&self) -> SeverityLevel {
        let worst_step = self
            .steps
            .values()
            .map(|o| o.severity)
            .max()
            .unwrap_or_default();
        worst_step.max(self.metrics.severity_floor())
    }

    /// Scores use the step counters as the test counts.
    pub fn refresh_scores(&mut self) {
        let counts = self.step_counts();
        let tests = TestCounts::new(counts.total, counts.passed, counts.failed, counts.skipped);
        self.scores = self.metrics.score_set_with_tests(tests);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGenerator;

    fn execution(ids: &SequentialIdGenerator) -> Execution {
        Execution::new(ids, "session-0", "owasp-a01", "Broken access control", 3)
    }

    fn finished_step(
        ids: &SequentialIdGenerator,
        execution: &Execution,
        step_id: &str,
        success: bool,
    ) -> StepResult {
        let mut step = StepResult::new(ids, execution.id.clone(), step_id, step_id, 3);
        step.start().unwrap();
        step.complete(success).unwrap();
        step
    }

    #[test]
    fn test_ten_steps_seven_passed() {
        let ids = SequentialIdGenerator::new();
        let mut exec = execution(&ids);
        exec.start().unwrap();

        for i in 0..10 {
            let step = finished_step(&ids, &exec, &format!("step_{i}"), i < 7);
            exec.record_step_result(&step);
        }

        assert_eq!(exec.success_rate(), 70.0);
        assert_eq!(exec.scores.success_rate, 70.0);
        let counts = exec.step_counts();
        assert_eq!((counts.total, counts.passed, counts.failed), (10, 7, 3));
    }

    #[test]
    fn test_empty_execution_has_zero_success_rate() {
        let ids = SequentialIdGenerator::new();
        let exec = execution(&ids);
        assert_eq!(exec.success_rate(), 0.0);
    }

    #[test]
    fn test_retried_step_replaces_previous_outcome() {
        let ids = SequentialIdGenerator::new();
        let mut exec = execution(&ids);
        exec.register_step("login");
        exec.register_step("login");
        assert_eq!(exec.step_counts().total, 1);

        let mut step = StepResult::new(&ids, exec.id.clone(), "login", "login", 3);
        step.start().unwrap();
        step.record_error("connection reset", ErrorKind::Network);
        exec.record_step_result(&step);
        assert_eq!(exec.step_counts().error, 1);

        step.retry("network blip").unwrap();
        step.start().unwrap();
        step.complete(true).unwrap();
        exec.record_step_result(&step);

        let counts = exec.step_counts();
        assert_eq!((counts.total, counts.passed, counts.error), (1, 1, 0));
    }

    #[test]
    fn test_finalize_precedence() {
        let ids = SequentialIdGenerator::new();

        let mut exec = execution(&ids);
        exec.start().unwrap();
        let passed = finished_step(&ids, &exec, "a", true);
        exec.record_step_result(&passed);
        assert_eq!(exec.finalize().unwrap(), ExecutionState::Passed);
        assert_eq!(exec.severity(), SeverityLevel::Info);

        let mut exec = execution(&ids);
        exec.start().unwrap();
        let failed = finished_step(&ids, &exec, "a", false);
        exec.record_step_result(&failed);
        assert_eq!(exec.finalize().unwrap(), ExecutionState::Failed);
        assert_eq!(exec.severity(), SeverityLevel::High);
        assert!(exec.can_retry());

        let mut exec = execution(&ids);
        exec.start().unwrap();
        exec.record_step_result(&failed);
        let mut timed_out = StepResult::new(&ids, exec.id.clone(), "b", "b", 3);
        timed_out.start().unwrap();
        timed_out.record_error("step deadline", ErrorKind::Timeout);
        exec.record_step_result(&timed_out);
        assert_eq!(exec.finalize().unwrap(), ExecutionState::Timeout);
        assert_eq!(exec.severity(), SeverityLevel::Critical);
    }

    #[test]
    fn test_retry_derives_new_id() {
        let ids = SequentialIdGenerator::new();
        let mut exec = execution(&ids);
        let original_id = exec.id.clone();
        exec.start().unwrap();
        exec.record_error("worker crashed", ErrorKind::Internal);

        exec.retry("rerun").unwrap();
        assert_eq!(exec.id, format!("{original_id}_retry_1"));
        assert_eq!(exec.retry_of_execution_id.as_deref(), Some(original_id.as_str()));

        exec.start().unwrap();
        exec.record_error("worker crashed again", ErrorKind::Internal);
        exec.retry("rerun").unwrap();
        assert_eq!(exec.id, format!("{original_id}_retry_2"));
        assert_eq!(
            exec.retry_of_execution_id,
            Some(format!("{original_id}_retry_1"))
        );
    }

    #[test]
    fn test_merge_step_metrics_escalates() {
        let ids = SequentialIdGenerator::new();
        let mut exec = execution(&ids);

        let mut store = MetricsStore::new();
        store.add_performance_metric("p95_score", "60");
        store.add_vulnerability("IDOR on /users/{id}");
        exec.merge_step_metrics("users_get", &store);

        assert_eq!(exec.severity(), SeverityLevel::Critical);
        assert!(exec.metrics.performance_metrics.contains_key("users_get.p95_score"));
        assert_eq!(exec.scores.performance_score, 60.0);
    }
}
