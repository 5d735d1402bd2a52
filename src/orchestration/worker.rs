//! # Scenario Worker
//!
//! Runs the steps of one scenario. The worker exclusively owns its
//! [`Execution`] and [`StepResult`]s; the only shared thing it touches is the
//! session, through its [`SessionHandle`].
//!
//! Every step runs under the smaller of the step deadline and what is left of
//! the session deadline. When the session deadline cuts a step short, the step
//! and the execution end in TIMEOUT and the remaining steps are skipped, so the
//! run always comes back to the orchestrator whole.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::debug;

use super::coordinator::{CoordinatorResult, SessionHandle};
use super::types::{ScenarioDefinition, ScenarioRun, StepContext, StepDefinition, StepExecutor, StepReport};
use crate::constants::events;
use crate::events::EventPublisher;
use crate::ids::SharedIdGenerator;
use crate::ledger::FaultReport;
use crate::logging::{log_error, log_step_operation};
use crate::metrics::telemetry;
use crate::models::{Execution, StepResult};
use crate::state_machine::{ComparisonResult, ErrorKind, ExecutionState};

/// A finished scenario and whether the session deadline ended it
#[derive(Debug)]
pub(crate) struct WorkerOutcome {
    pub run: ScenarioRun,
    pub deadline_reached: bool,
}

#[derive(Clone)]
pub(crate) struct ScenarioWorker {
    pub session_id: String,
    pub handle: SessionHandle,
    pub executor: Arc<dyn StepExecutor>,
    pub publisher: EventPublisher,
    pub ids: SharedIdGenerator,
    pub step_timeout: Duration,
    /// Session deadline
    pub deadline: Instant,
    pub step_max_retries: u32,
    pub execution_max_retries: u32,
}

impl ScenarioWorker {
    pub async fn run(&self, scenario: ScenarioDefinition) -> WorkerOutcome {
        let mut execution = Execution::new(
            self.ids.as_ref(),
            self.session_id.clone(),
            scenario.id.clone(),
            scenario.name.clone(),
            self.execution_max_retries,
        );
        for step in &scenario.steps {
            execution.register_step(step.id.clone());
        }
        if let Err(e) = execution.start() {
            log_error("scenario_worker", "start_execution", &e.to_string(), Some(&execution.id));
        }

        self.publisher.publish(
            events::EXECUTION_STARTED,
            json!({
                "session_id": self.session_id,
                "execution_id": execution.id,
                "scenario_id": scenario.id,
                "step_count": scenario.steps.len(),
            }),
        );

        let mut step_results = Vec::with_capacity(scenario.steps.len());
        let mut deadline_reached = false;
        let mut interrupted = false;
        for step in &scenario.steps {
            let session_step = scenario.session_step_name(step);

            let result = if self.handle.snapshot().is_completed() {
                interrupted = true;
                self.skip_step(&execution, step, &session_step, "Session finished before the step ran")
                    .await
            } else if deadline_reached || Instant::now() >= self.deadline {
                deadline_reached = true;
                self.skip_step(&execution, step, &session_step, "Session deadline passed before the step ran")
                    .await
            } else {
                let (result, cut_short) = self.run_step(&execution, &scenario, step, &session_step).await;
                deadline_reached |= cut_short;
                result
            };

            execution.record_step_result(&result);
            execution.merge_step_metrics(&step.id, &result.metrics);
            for warning in result.warnings() {
                execution.add_warning(warning.clone());
            }
            step_results.push(result);
        }

        let status = settle(&mut execution, deadline_reached, interrupted);

        self.publisher.publish(
            events::EXECUTION_FINISHED,
            json!({
                "session_id": self.session_id,
                "execution_id": execution.id,
                "scenario_id": scenario.id,
                "status": status,
                "success_rate": execution.success_rate(),
            }),
        );

        WorkerOutcome {
            run: ScenarioRun {
                execution,
                step_results,
            },
            deadline_reached,
        }
    }

    /// Record a step as not run and count it as skipped on the session
    async fn skip_step(
        &self,
        execution: &Execution,
        step: &StepDefinition,
        session_step: &str,
        reason: &str,
    ) -> StepResult {
        let mut result = self.new_step_result(execution, step);
        if let Err(e) = result.skip(reason) {
            log_error("scenario_worker", "skip_step", &e.to_string(), Some(&result.id));
        }
        self.note(self.handle.skip_step(session_step).await, "skip_step");
        telemetry::record_step_result(result.status());
        result
    }

    async fn run_step(
        &self,
        execution: &Execution,
        scenario: &ScenarioDefinition,
        step: &StepDefinition,
        session_step: &str,
    ) -> (StepResult, bool) {
        let mut result = self.new_step_result(execution, step);
        if let Err(e) = result.start() {
            log_error("scenario_worker", "start_step", &e.to_string(), Some(&result.id));
        }

        let context = StepContext {
            session_id: self.session_id.clone(),
            execution_id: execution.id.clone(),
            step_result_id: result.id.clone(),
            scenario_id: scenario.id.clone(),
            step: step.clone(),
            attempt: result.lifecycle.retry_count + 1,
        };
        let max_attempts = self.step_max_retries + 1;

        log_step_operation(
            "execute_step",
            Some(&self.session_id),
            Some(&execution.id),
            &step.id,
            "in_progress",
            None,
        );

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let session_bound = remaining < self.step_timeout;
        let mut deadline_reached = false;

        match timeout(remaining.min(self.step_timeout), self.executor.execute_step(&context)).await {
            Ok(Ok(report)) => {
                let success = self.apply_report(&mut result, step, report).await;
                if let Err(e) = result.complete(success) {
                    log_error("scenario_worker", "complete_step", &e.to_string(), Some(&result.id));
                }
                self.note(
                    self.handle.complete_step(session_step, success).await,
                    "complete_step",
                );
            }
            Ok(Err(fault)) => {
                result.record_error(fault.message.clone(), fault.kind);
                let source = fault
                    .source
                    .clone()
                    .unwrap_or_else(|| self.executor.executor_name().to_string());
                let mut report = FaultReport::from_error_kind(fault.message.clone(), fault.kind)
                    .for_step(result.id.clone())
                    .with_source(source)
                    .with_attempts(context.attempt, max_attempts);
                if let Some(evidence) = fault.evidence {
                    report = report.with_evidence(evidence);
                }
                self.raise(
                    format!("Step '{session_step}' errored: {}", fault.message),
                    report,
                )
                .await;
            }
            Err(_elapsed) if session_bound => {
                // The session-level ledger entry is written by the orchestrator
                result.record_error(
                    format!("Session deadline reached while step '{}' was running", step.id),
                    ErrorKind::Timeout,
                );
                self.note(
                    self.handle.complete_step(session_step, false).await,
                    "complete_step",
                );
                deadline_reached = true;
            }
            Err(_elapsed) => {
                let message = format!(
                    "Step '{}' exceeded its {}ms deadline",
                    step.id,
                    self.step_timeout.as_millis()
                );
                result.record_error(message.clone(), ErrorKind::Timeout);
                self.publisher.publish(
                    events::STEP_TIMED_OUT,
                    json!({
                        "session_id": self.session_id,
                        "execution_id": execution.id,
                        "step_id": step.id,
                        "timeout_ms": self.step_timeout.as_millis() as u64,
                    }),
                );
                let report = FaultReport::from_error_kind(message, ErrorKind::Timeout)
                    .for_step(result.id.clone())
                    .with_source("orchestrator")
                    .with_attempts(context.attempt, max_attempts);
                self.raise(format!("Step '{session_step}' timed out"), report)
                    .await;
            }
        }

        telemetry::record_step_result(result.status());
        log_step_operation(
            "execute_step",
            Some(&self.session_id),
            Some(&execution.id),
            &step.id,
            &result.status().to_string(),
            result.lifecycle.error_message.as_deref(),
        );
        (result, deadline_reached)
    }

    fn new_step_result(&self, execution: &Execution, step: &StepDefinition) -> StepResult {
        let mut result = StepResult::new(
            self.ids.as_ref(),
            execution.id.clone(),
            step.id.clone(),
            step.name.clone(),
            self.step_max_retries,
        );
        result.expected_result = step.expected_result.clone();
        result
    }

    /// Fold a collaborator report into the step result and return the verdict.
    ///
    /// The step passes when the collaborator says so and no required
    /// assertion failed. Failed optional assertions become warnings.
    async fn apply_report(&self, result: &mut StepResult, step: &StepDefinition, report: StepReport) -> bool {
        let comparison = report.comparison.unwrap_or(
            match (&step.expected_result, &report.actual_result) {
                (Some(expected), Some(actual)) if expected == actual => ComparisonResult::Match,
                (Some(_), Some(_)) => ComparisonResult::Mismatch,
                _ => ComparisonResult::NotCompared,
            },
        );
        result.record_comparison(
            comparison,
            step.expected_result.clone(),
            report.actual_result.clone(),
        );

        for definition in &step.assertions {
            let mut assertion = result
                .new_assertion(
                    self.ids.as_ref(),
                    definition.name.clone(),
                    definition.assertion_type,
                    definition.expected_value.clone(),
                )
                .critical(definition.is_critical)
                .optional(definition.is_optional);
            if let Some(path) = &definition.source_path {
                assertion = assertion.with_source_path(path.clone());
            }

            match report
                .assertion_outcomes
                .iter()
                .find(|outcome| outcome.name == definition.name)
            {
                Some(outcome) => match outcome.passed {
                    Some(passed) => assertion.execute(outcome.actual_value.clone(), passed),
                    None => {
                        if assertion.check(&outcome.actual_value).is_none() {
                            assertion.mark_error(format!(
                                "No local evaluator for {} assertions",
                                definition.assertion_type
                            ));
                        }
                    }
                },
                None => assertion.skip("No outcome reported"),
            }

            if assertion.is_failed() && assertion.is_optional {
                result.add_warning(format!("Optional assertion '{}' failed", assertion.name));
            }
            result.record_assertion(assertion);
        }

        let required_failed = result
            .assertions()
            .iter()
            .any(|assertion| assertion.is_failed() && !assertion.is_optional);

        if let Some(tests) = report.tests {
            result.set_test_counts(tests);
        }
        for (key, value) in report.metrics {
            result.add_metric(key, value);
        }
        for (key, value) in report.performance_metrics {
            result.add_performance_metric(key, value);
        }
        for (key, value) in report.security_metrics {
            result.add_security_metric(key, value);
        }
        for (key, value) in report.quality_metrics {
            result.add_quality_metric(key, value);
        }
        for check in report.validation_checks {
            result.add_validation_check(check);
        }
        for validation in report.failed_validations {
            result.add_failed_validation(validation);
        }
        for finding in report.security_findings {
            result.add_security_finding(finding);
        }
        for vulnerability in report.vulnerabilities {
            result.add_vulnerability(vulnerability);
        }

        for warning in report.warnings {
            result.add_warning(warning.clone());
            self.note(self.handle.add_warning(warning).await, "add_warning");
        }
        for artifact in report.artifacts {
            self.note(self.handle.add_artifact(artifact).await, "add_artifact");
        }

        report.passed && !required_failed
    }

    async fn raise(&self, message: String, report: FaultReport) {
        match self.handle.add_error(message, report).await {
            Ok(record) => debug!(
                correlation_id = %record.correlation_id,
                session_id = %self.session_id,
                "Step fault recorded"
            ),
            Err(e) => log_error("scenario_worker", "add_error", &e.to_string(), Some(&self.session_id)),
        }
    }

    /// Session bookkeeping failures are logged; they never stop the scenario
    fn note<T>(&self, result: CoordinatorResult<T>, operation: &str) {
        if let Err(e) = result {
            log_error("scenario_worker", operation, &e.to_string(), Some(&self.session_id));
        }
    }
}

/// Terminal status for a scenario. A session deadline that cut it short gives
/// TIMEOUT, a session that finished underneath it gives CANCELLED, otherwise
/// the step outcomes decide.
fn settle(execution: &mut Execution, deadline_reached: bool, interrupted: bool) -> ExecutionState {
    let settled = if deadline_reached {
        execution.record_error(
            "Session deadline reached before the scenario finished",
            ErrorKind::Timeout,
        );
        Ok(())
    } else if interrupted {
        execution.cancel()
    } else {
        execution.finalize().map(|_| ())
    };

    if let Err(e) = settled {
        log_error("scenario_worker", "settle_execution", &e.to_string(), Some(&execution.id));
    }
    execution.status()
}
