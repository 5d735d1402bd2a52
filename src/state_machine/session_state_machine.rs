use super::{
    errors::{invalid_transition, StateMachineResult},
    events::SessionEvent,
    states::SessionState,
};

/// Transition table for orchestration sessions.
///
/// Guards that depend on session data (retry budget, known step names) live on
/// the session itself; this table only knows which edges exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: SessionState,
        event: &SessionEvent,
    ) -> StateMachineResult<SessionState> {
        let target = match (current_state, event) {
            // Start transitions
            (SessionState::Pending | SessionState::Preparing, SessionEvent::Start) => {
                SessionState::InProgress
            }

            // Advisory phases may be entered from any live state
            (from, SessionEvent::EnterPhase(phase)) if !from.is_terminal() => phase.state(),

            // Terminal status precedence: errors, then success, then failure
            (from, SessionEvent::Complete { success, has_errors }) if !from.is_terminal() => {
                if *has_errors {
                    SessionState::Error
                } else if *success {
                    SessionState::Completed
                } else {
                    SessionState::Failed
                }
            }

            (from, SessionEvent::Cancel) if !from.is_terminal() => SessionState::Cancelled,
            (from, SessionEvent::Timeout) if !from.is_terminal() => SessionState::Timeout,

            // Retry transitions (from failed or errored sessions back to pending)
            (SessionState::Failed | SessionState::Error, SessionEvent::Retry) => {
                SessionState::Pending
            }

            // Invalid transitions
            (from_state, event) => return Err(invalid_transition(from_state, event)),
        };

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::states::PipelinePhase;
    use crate::state_machine::StateMachineError;

    fn transition(from: SessionState, event: SessionEvent) -> StateMachineResult<SessionState> {
        SessionStateMachine::determine_target_state(from, &event)
    }

    #[test]
    fn test_happy_path_through_pipeline() {
        let mut state = SessionState::Pending;
        state = transition(state, SessionEvent::EnterPhase(PipelinePhase::Preparing)).unwrap();
        assert_eq!(state, SessionState::Preparing);
        state = transition(state, SessionEvent::Start).unwrap();
        assert_eq!(state, SessionState::InProgress);
        for phase in [
            PipelinePhase::ExecutingTests,
            PipelinePhase::AnalyzingResults,
            PipelinePhase::GeneratingReport,
        ] {
            state = transition(state, SessionEvent::EnterPhase(phase)).unwrap();
            assert_eq!(state, phase.state());
        }
        state = transition(
            state,
            SessionEvent::Complete {
                success: true,
                has_errors: false,
            },
        )
        .unwrap();
        assert_eq!(state, SessionState::Completed);
    }

    #[test]
    fn test_error_takes_precedence_over_success() {
        let state = transition(
            SessionState::InProgress,
            SessionEvent::Complete {
                success: true,
                has_errors: true,
            },
        )
        .unwrap();
        assert_eq!(state, SessionState::Error);

        let state = transition(
            SessionState::InProgress,
            SessionEvent::Complete {
                success: false,
                has_errors: false,
            },
        )
        .unwrap();
        assert_eq!(state, SessionState::Failed);
    }

    #[test]
    fn test_terminal_states_reject_everything_but_retry() {
        for terminal in [
            SessionState::Completed,
            SessionState::Failed,
            SessionState::Error,
            SessionState::Cancelled,
            SessionState::Timeout,
        ] {
            assert!(transition(terminal, SessionEvent::Start).is_err());
            assert!(transition(terminal, SessionEvent::Cancel).is_err());
            assert!(transition(terminal, SessionEvent::Timeout).is_err());
            assert!(
                transition(terminal, SessionEvent::EnterPhase(PipelinePhase::Preparing)).is_err()
            );
        }

        assert_eq!(
            transition(SessionState::Failed, SessionEvent::Retry).unwrap(),
            SessionState::Pending
        );
        assert_eq!(
            transition(SessionState::Error, SessionEvent::Retry).unwrap(),
            SessionState::Pending
        );
        assert!(matches!(
            transition(SessionState::Completed, SessionEvent::Retry),
            Err(StateMachineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_start_only_from_pending_or_preparing() {
        assert!(transition(SessionState::InProgress, SessionEvent::Start).is_err());
        assert!(transition(SessionState::ExecutingTests, SessionEvent::Start).is_err());
    }
}
