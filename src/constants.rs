//! # System Constants
//!
//! Event names, defaults and status groupings that define the operational
//! boundaries of the campaign core.

use std::collections::HashMap;

pub use crate::state_machine::{ExecutionState as ExecutionStatus, SessionState as SessionStatus};

/// Default retry budget for sessions, executions and step results
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle events published on the event publisher
pub mod events {
    // Session lifecycle events
    pub const SESSION_STARTED: &str = "session.started";
    pub const SESSION_PHASE_ENTERED: &str = "session.phase_entered";
    pub const SESSION_COMPLETED: &str = "session.completed";
    pub const SESSION_FAILED: &str = "session.failed";
    pub const SESSION_ERRORED: &str = "session.errored";
    pub const SESSION_CANCELLED: &str = "session.cancelled";
    pub const SESSION_TIMED_OUT: &str = "session.timed_out";
    pub const SESSION_RETRY_REQUESTED: &str = "session.retry_requested";

    // Execution events
    pub const EXECUTION_STARTED: &str = "execution.started";
    pub const EXECUTION_FINISHED: &str = "execution.finished";
    pub const STEP_TIMED_OUT: &str = "step.timed_out";

    // Ledger events
    pub const FAULT_RECORDED: &str = "ledger.fault_recorded";
    pub const FAULT_RECOVERED: &str = "ledger.fault_recovered";
    pub const ALERT_RAISED: &str = "ledger.alert_raised";
}

/// System-wide constants
pub mod system {
    /// Unknown value placeholder
    pub const UNKNOWN: &str = "unknown";

    /// Version marker
    pub const CAMPAIGN_CORE_VERSION: &str = "0.1.0";

    /// Prefix for recovery actions written when manual intervention is requested
    pub const MANUAL_INTERVENTION_PREFIX: &str = "Manual intervention required";
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::{ExecutionStatus, SessionStatus};

    /// Session statuses that end the session
    pub const SESSION_FINAL_STATES: &[SessionStatus] = &[
        SessionStatus::Completed,
        SessionStatus::Failed,
        SessionStatus::Error,
        SessionStatus::Cancelled,
        SessionStatus::Timeout,
    ];

    /// Session statuses from which a retry can be requested
    pub const SESSION_RETRYABLE_STATES: &[SessionStatus] =
        &[SessionStatus::Failed, SessionStatus::Error];

    /// Execution statuses that count as errored rather than failed
    pub const EXECUTION_ERROR_STATES: &[ExecutionStatus] =
        &[ExecutionStatus::Error, ExecutionStatus::Timeout];

    /// Execution statuses that count as not run
    pub const EXECUTION_NOT_RUN_STATES: &[ExecutionStatus] =
        &[ExecutionStatus::Skipped, ExecutionStatus::Cancelled];
}

/// State transition event mapping
pub type SessionTransitionKey = (Option<SessionStatus>, SessionStatus);
pub type SessionTransitionMap = HashMap<SessionTransitionKey, &'static str>;

/// Build the map from session transitions to published event names.
///
/// Transitions into a terminal state are keyed without a source state since
/// every live state can reach them.
pub fn build_session_transition_map() -> SessionTransitionMap {
    let mut map = HashMap::new();

    map.insert(
        (Some(SessionStatus::Pending), SessionStatus::InProgress),
        events::SESSION_STARTED,
    );
    map.insert(
        (Some(SessionStatus::Preparing), SessionStatus::InProgress),
        events::SESSION_STARTED,
    );

    for phase in [
        SessionStatus::Preparing,
        SessionStatus::ExecutingTests,
        SessionStatus::AnalyzingResults,
        SessionStatus::GeneratingReport,
    ] {
        map.insert((None, phase), events::SESSION_PHASE_ENTERED);
    }

    map.insert((None, SessionStatus::Completed), events::SESSION_COMPLETED);
    map.insert((None, SessionStatus::Failed), events::SESSION_FAILED);
    map.insert((None, SessionStatus::Error), events::SESSION_ERRORED);
    map.insert((None, SessionStatus::Cancelled), events::SESSION_CANCELLED);
    map.insert((None, SessionStatus::Timeout), events::SESSION_TIMED_OUT);

    map.insert(
        (Some(SessionStatus::Failed), SessionStatus::Pending),
        events::SESSION_RETRY_REQUESTED,
    );
    map.insert(
        (Some(SessionStatus::Error), SessionStatus::Pending),
        events::SESSION_RETRY_REQUESTED,
    );

    map
}

/// Look up the event name for a session transition, falling back to the
/// source-less key.
pub fn session_transition_event(
    map: &SessionTransitionMap,
    from: SessionStatus,
    to: SessionStatus,
) -> Option<&'static str> {
    map.get(&(Some(from), to))
        .or_else(|| map.get(&(None, to)))
        .copied()
}
