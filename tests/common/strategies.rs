use proptest::prelude::*;
use proptest::strategy::Just;

use campaign_core::metrics::TestCounts;
use campaign_core::models::SeverityLevel;

/// One bookkeeping call against a running session
#[derive(Debug, Clone)]
pub enum SessionOp {
    Complete { step: usize, success: bool },
    Skip { step: usize },
    Error(String),
    Warning(String),
}

/// Strategy for generating step names
pub fn step_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Strategy for generating a set of distinct step names
pub fn step_names_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(step_name_strategy(), 0..12).prop_map(|names| names.into_iter().collect())
}

/// Strategy for generating session operations against `step_count` steps.
/// Step indices may point past the registered steps to exercise rejection.
pub fn session_op_strategy(step_count: usize) -> impl Strategy<Value = SessionOp> {
    let upper = step_count + 2;
    prop_oneof![
        4 => (0..upper, any::<bool>()).prop_map(|(step, success)| SessionOp::Complete { step, success }),
        1 => (0..upper).prop_map(|step| SessionOp::Skip { step }),
        1 => "[a-z ]{1,20}".prop_map(SessionOp::Error),
        1 => "[a-z ]{1,20}".prop_map(SessionOp::Warning),
    ]
}

/// Strategy for generating consistent test counts
pub fn test_counts_strategy() -> impl Strategy<Value = TestCounts> {
    (0u32..500)
        .prop_flat_map(|total| (Just(total), 0..=total))
        .prop_flat_map(|(total, passed)| (Just(total), Just(passed), 0..=(total - passed)))
        .prop_map(|(total, passed, failed)| {
            TestCounts::new(total, passed, failed, total - passed - failed)
        })
}

/// Strategy for generating score components, zero included often
pub fn score_component_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0f64..=100.0]
}

/// Strategy for generating raw performance metric values
pub fn metric_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0.0f64..150.0).prop_map(|v| format!("{v:.2}")),
        Just("n/a".to_string()),
        Just(String::new()),
        Just("-12".to_string()),
    ]
}

pub fn severity_strategy() -> impl Strategy<Value = SeverityLevel> {
    prop_oneof![
        Just(SeverityLevel::Info),
        Just(SeverityLevel::Low),
        Just(SeverityLevel::Medium),
        Just(SeverityLevel::High),
        Just(SeverityLevel::Critical),
    ]
}
