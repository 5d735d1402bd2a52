mod common;

use common::strategies::*;
use proptest::prelude::*;

use campaign_core::ids::SequentialIdGenerator;
use campaign_core::metrics::{overall_score, performance_score, success_rate, MetricsStore};
use campaign_core::models::{Assertion, AssertionType, OrchestrationSession, SeverityLevel, StepResult};
use campaign_core::state_machine::SessionState;

fn session_with_steps(names: &[String], max_retries: u32) -> OrchestrationSession {
    let ids = SequentialIdGenerator::new();
    let mut session = OrchestrationSession::new(&ids, "property", "proptest", max_retries);
    for name in names {
        session.add_step(name.clone());
    }
    session
}

proptest! {
    /// Property: completed == passed + failed and never exceeds total, whatever
    /// sequence of bookkeeping calls arrives
    #[test]
    fn step_counters_stay_consistent(
        names in step_names_strategy(),
        ops in prop::collection::vec(session_op_strategy(12), 0..40),
    ) {
        let mut session = session_with_steps(&names, 3);
        session.start().unwrap();

        for op in ops {
            match op {
                SessionOp::Complete { step, success } => {
                    let name = names.get(step).cloned().unwrap_or_else(|| "unregistered".to_string());
                    let _ = session.complete_step(&name, success);
                }
                SessionOp::Skip { step } => {
                    let name = names.get(step).cloned().unwrap_or_else(|| "unregistered".to_string());
                    let _ = session.skip_step(&name);
                }
                SessionOp::Error(message) => {
                    session.add_error(message, None);
                }
                SessionOp::Warning(warning) => {
                    session.add_warning(warning);
                }
            }

            prop_assert_eq!(session.completed_steps, session.passed_steps + session.failed_steps);
            prop_assert!(session.completed_steps + session.skipped_steps <= session.total_steps);
            prop_assert!((0.0..=100.0).contains(&session.success_rate()));
        }
    }

    /// Property: adding a step twice never changes the total
    #[test]
    fn add_step_is_idempotent(names in step_names_strategy()) {
        let mut session = session_with_steps(&names, 3);
        for name in &names {
            prop_assert!(!session.add_step(name.clone()));
        }
        prop_assert_eq!(session.total_steps as usize, names.len());
    }

    /// Property: retry is a no-op once the budget is spent
    #[test]
    fn retry_is_noop_past_budget(max_retries in 0u32..4, attempts in 0u32..8) {
        let mut session = session_with_steps(&["only".to_string()], max_retries);

        for _ in 0..attempts {
            if session.status == SessionState::Pending {
                session.start().unwrap();
            }
            if !session.is_completed() {
                session.complete_step("only", false).unwrap();
                session.complete(false).unwrap();
            }

            let before = session.clone();
            let outcome = session.retry("flaky");
            if before.retry_count >= max_retries {
                prop_assert!(outcome.is_err());
                prop_assert_eq!(&session, &before);
            } else {
                prop_assert!(outcome.is_ok());
                prop_assert_eq!(session.retry_count, before.retry_count + 1);
            }
        }
        prop_assert!(session.retry_count <= max_retries);
    }

    /// Property: rates land in [0, 100] and are exactly 0 with nothing to rate
    #[test]
    fn success_rate_is_bounded(passed in 0u32..1000, total in 0u32..1000) {
        let rate = success_rate(passed.min(total), total);
        prop_assert!((0.0..=100.0).contains(&rate));
        if total == 0 {
            prop_assert_eq!(rate, 0.0);
        }
    }

    /// Property: test count success rates agree with the free function
    #[test]
    fn test_counts_rate_matches(counts in test_counts_strategy()) {
        prop_assert_eq!(counts.success_rate(), success_rate(counts.passed, counts.total));
        prop_assert_eq!(counts.passed + counts.failed + counts.skipped, counts.total);
    }

    /// Property: overall score ignores zero components and is 0 when all are
    #[test]
    fn overall_score_excludes_zeros(components in prop::collection::vec(score_component_strategy(), 0..6)) {
        let score = overall_score(&components);
        let measured: Vec<f64> = components.iter().copied().filter(|c| *c > 0.0).collect();

        if measured.is_empty() {
            prop_assert_eq!(score, 0.0);
        } else {
            let expected = measured.iter().sum::<f64>() / measured.len() as f64;
            prop_assert!((score - expected).abs() < 1e-9);
            let min = measured.iter().copied().fold(f64::INFINITY, f64::min);
            let max = measured.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(score >= min - 1e-9 && score <= max + 1e-9);
        }
    }

    /// Property: performance scores stay in range whatever the raw values look like
    #[test]
    fn performance_score_is_bounded(values in prop::collection::vec(metric_value_strategy(), 0..20)) {
        let score = performance_score(values.iter().map(String::as_str));
        prop_assert!((0.0..=100.0).contains(&score));

        let mut store = MetricsStore::new();
        for (i, value) in values.iter().enumerate() {
            store.add_performance_metric(format!("metric_{i}"), value.clone());
        }
        let set = store.score_set();
        prop_assert!((0.0..=100.0).contains(&set.overall_score));
    }

    /// Property: severity escalation never lowers
    #[test]
    fn escalation_is_monotonic(start in severity_strategy(), floor in severity_strategy()) {
        let mut severity = start;
        severity.escalate_to(floor);
        prop_assert_eq!(severity, start.max(floor));
    }

    /// Property: a failed critical assertion makes its step CRITICAL
    #[test]
    fn failed_critical_assertion_makes_step_critical(expected in "[a-z]{1,8}", actual in "[A-Z]{1,8}") {
        let ids = SequentialIdGenerator::new();
        let mut step = StepResult::new(&ids, "execution-1", "step-1", "Step", 3);
        step.start().unwrap();

        let mut assertion = Assertion::new(&ids, step.id.clone(), "must match", AssertionType::Equals, Some(expected))
            .critical(true);
        assertion.check(&actual);
        prop_assert!(assertion.is_failed());
        step.record_assertion(assertion);
        step.complete(false).unwrap();

        prop_assert_eq!(step.severity(), SeverityLevel::Critical);
    }
}
