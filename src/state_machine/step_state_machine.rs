use super::{
    errors::{invalid_transition, StateMachineResult},
    events::{ErrorKind, StepEvent},
    states::ExecutionState,
};

/// Transition table shared by executions and step results.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStateMachine;

impl StepStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: ExecutionState,
        event: &StepEvent,
    ) -> StateMachineResult<ExecutionState> {
        let target = match (current_state, event) {
            // Start transitions
            (ExecutionState::Pending, StepEvent::Start) => ExecutionState::InProgress,

            // Complete transitions
            (ExecutionState::InProgress, StepEvent::Complete(true)) => ExecutionState::Passed,
            (ExecutionState::InProgress, StepEvent::Complete(false)) => ExecutionState::Failed,

            // Errors short-circuit from any state
            (_, StepEvent::RecordError(ErrorKind::Timeout)) => ExecutionState::Timeout,
            (_, StepEvent::RecordError(_)) => ExecutionState::Error,

            // Skip and cancel transitions
            (ExecutionState::Pending | ExecutionState::InProgress, StepEvent::Skip) => {
                ExecutionState::Skipped
            }
            (ExecutionState::Pending | ExecutionState::InProgress, StepEvent::Cancel) => {
                ExecutionState::Cancelled
            }

            // Retry transitions (back to pending, caller starts again)
            (
                ExecutionState::Failed | ExecutionState::Error | ExecutionState::Timeout,
                StepEvent::Retry,
            ) => ExecutionState::Pending,

            // Invalid transitions
            (from_state, event) => return Err(invalid_transition(from_state, event)),
        };

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: ExecutionState, event: StepEvent) -> StateMachineResult<ExecutionState> {
        StepStateMachine::determine_target_state(from, &event)
    }

    #[test]
    fn test_start_and_complete() {
        let started = transition(ExecutionState::Pending, StepEvent::Start).unwrap();
        assert_eq!(started, ExecutionState::InProgress);
        assert_eq!(
            transition(started, StepEvent::Complete(true)).unwrap(),
            ExecutionState::Passed
        );
        assert_eq!(
            transition(started, StepEvent::Complete(false)).unwrap(),
            ExecutionState::Failed
        );
    }

    #[test]
    fn test_complete_requires_in_progress() {
        assert!(transition(ExecutionState::Pending, StepEvent::Complete(true)).is_err());
        assert!(transition(ExecutionState::Passed, StepEvent::Complete(false)).is_err());
    }

    #[test]
    fn test_record_error_wins_from_any_state() {
        for state in [
            ExecutionState::Pending,
            ExecutionState::InProgress,
            ExecutionState::Passed,
            ExecutionState::Failed,
        ] {
            assert_eq!(
                transition(state, StepEvent::RecordError(ErrorKind::Network)).unwrap(),
                ExecutionState::Error
            );
            assert_eq!(
                transition(state, StepEvent::RecordError(ErrorKind::Timeout)).unwrap(),
                ExecutionState::Timeout
            );
        }
    }

    #[test]
    fn test_retry_only_from_failure_states() {
        assert_eq!(
            transition(ExecutionState::Error, StepEvent::Retry).unwrap(),
            ExecutionState::Pending
        );
        assert!(transition(ExecutionState::Passed, StepEvent::Retry).is_err());
        assert!(transition(ExecutionState::InProgress, StepEvent::Retry).is_err());
    }
}
