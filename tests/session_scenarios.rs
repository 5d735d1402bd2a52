//! End-to-end bookkeeping scenarios on the plain models, no orchestrator.

use campaign_core::ids::SequentialIdGenerator;
use campaign_core::metrics::{validation_pass_rate, MetricsStore, TestCounts};
use campaign_core::models::{
    Assertion, AssertionType, Execution, OrchestrationSession, SessionError, SeverityLevel,
    StepResult,
};
use campaign_core::state_machine::{AssertionState, ExecutionState, PipelinePhase, SessionState};

fn two_step_session(ids: &SequentialIdGenerator) -> OrchestrationSession {
    let mut session = OrchestrationSession::new(ids, "checkout", "ci", 3);
    session.add_step("s1");
    session.add_step("s2");
    session
}

#[test]
fn test_mixed_outcomes_end_failed() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    assert_eq!(session.total_steps, 2);

    session.start().unwrap();
    assert_eq!(session.status, SessionState::InProgress);

    session.complete_step("s1", true).unwrap();
    assert_eq!(session.passed_steps, 1);
    assert_eq!(session.completed_steps, 1);

    session.complete_step("s2", false).unwrap();
    assert_eq!(session.failed_steps, 1);
    assert_eq!(session.completed_steps, 2);

    assert_eq!(session.complete(false).unwrap(), SessionState::Failed);
    let duration = session.total_duration_ms.expect("duration is set once started and completed");
    assert!(duration >= 0);
    assert_eq!(session.success_rate(), 50.0);
    assert_eq!(session.completion_rate(), 100.0);
}

#[test]
fn test_recorded_error_ends_in_error() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    session.start().unwrap();
    session.complete_step("s1", true).unwrap();
    session.complete_step("s2", false).unwrap();

    assert!(session.add_error("boom", None));
    assert!(!session.add_error("boom", None));
    assert_eq!(session.severity, SeverityLevel::Critical);

    assert_eq!(session.complete(false).unwrap(), SessionState::Error);
    assert!(session.has_errors());
    assert_eq!(session.critical_errors(), ["boom".to_string()]);
}

#[test]
fn test_error_wins_even_when_reported_successful() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    session.start().unwrap();
    session.add_error("lost connection", Some("corr-1".to_string()));

    assert_eq!(session.complete(true).unwrap(), SessionState::Error);
    assert_eq!(session.ledger_correlation_ids(), ["corr-1".to_string()]);
}

#[test]
fn test_pipeline_phases_then_complete() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    session.enter_phase(PipelinePhase::Preparing).unwrap();
    session.start().unwrap();
    session.enter_phase(PipelinePhase::ExecutingTests).unwrap();
    session.complete_step("s1", true).unwrap();
    session.complete_step("s2", true).unwrap();
    session.enter_phase(PipelinePhase::AnalyzingResults).unwrap();
    session.enter_phase(PipelinePhase::GeneratingReport).unwrap();

    assert_eq!(session.complete(true).unwrap(), SessionState::Completed);
    assert!(session.is_success());
    assert_eq!(session.severity, SeverityLevel::Info);
}

#[test]
fn test_terminal_session_rejects_bookkeeping_transitions() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    session.start().unwrap();
    session.cancel().unwrap();

    assert!(matches!(session.start(), Err(SessionError::Transition(_))));
    assert!(matches!(session.complete(true), Err(SessionError::Transition(_))));
    assert!(matches!(session.retry("again"), Err(SessionError::RetryNotAllowed { .. })));
    assert_eq!(session.status, SessionState::Cancelled);
}

#[test]
fn test_retry_starts_a_new_attempt_under_a_new_id() {
    let ids = SequentialIdGenerator::new();
    let mut session = two_step_session(&ids);
    let original_id = session.id.clone();
    session.start().unwrap();
    session.complete_step("s1", false).unwrap();
    session.complete(false).unwrap();

    session.retry("flaky network").unwrap();
    assert_eq!(session.status, SessionState::Pending);
    assert_ne!(session.id, original_id);
    assert_eq!(session.retry_of_session_id.as_deref(), Some(original_id.as_str()));
    assert_eq!(session.completed_steps, 0);
    assert_eq!(session.total_steps, 2);

    session.start().unwrap();
    session.complete_step("s1", true).unwrap();
    session.complete_step("s2", true).unwrap();
    assert_eq!(session.complete(true).unwrap(), SessionState::Completed);
}

#[test]
fn test_execution_with_ten_tests_seven_passed() {
    let ids = SequentialIdGenerator::new();
    let mut execution = Execution::new(&ids, "session-1", "regression", "Regression", 3);
    for n in 0..10 {
        execution.register_step(format!("test-{n}"));
    }
    execution.start().unwrap();

    for n in 0..10 {
        let mut step = StepResult::new(&ids, execution.id.clone(), format!("test-{n}"), "test", 3);
        step.start().unwrap();
        step.complete(n < 7).unwrap();
        execution.record_step_result(&step);
    }

    assert_eq!(execution.success_rate(), 70.0);
    assert_eq!(execution.finalize().unwrap(), ExecutionState::Failed);
    assert_eq!(execution.scores.success_rate, 70.0);
}

#[test]
fn test_reported_test_counts_drive_step_scores() {
    let ids = SequentialIdGenerator::new();
    let mut step = StepResult::new(&ids, "execution-1", "suite", "Unit suite", 3);
    step.start().unwrap();
    step.set_test_counts(TestCounts::new(10, 7, 3, 0));
    step.complete(false).unwrap();

    assert_eq!(step.scores.success_rate, 70.0);
    // no validations recorded: quality is the mean of 70 and 100
    assert_eq!(step.scores.quality_score, 85.0);
}

#[test]
fn test_zero_validation_checks_score_full_marks() {
    assert_eq!(validation_pass_rate(0, 0), 100.0);

    let store = MetricsStore::new();
    assert_eq!(store.validation_pass_rate(), 100.0);
}

#[test]
fn test_critical_assertion_failure() {
    let ids = SequentialIdGenerator::new();
    let mut step = StepResult::new(&ids, "execution-1", "login", "Login", 3);
    step.start().unwrap();

    let mut assertion = Assertion::new(
        &ids,
        step.id.clone(),
        "status code",
        AssertionType::Equals,
        Some("200".to_string()),
    )
    .critical(true);
    assertion.execute("expected", false);
    assert_eq!(assertion.status, AssertionState::Failed);
    assert_eq!(assertion.severity, SeverityLevel::Critical);

    step.record_assertion(assertion);
    step.complete(true).unwrap();
    assert!(step.has_critical_failure());
    assert_eq!(step.severity(), SeverityLevel::Critical);
}
