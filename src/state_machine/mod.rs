// State machine module for campaign orchestration
//
// Sessions, executions and step results move through closed state enums. The
// transition tables are pure functions; the entities in `models` apply them and
// carry the data-dependent guards (retry budgets, known step names).

pub mod errors;
pub mod events;
pub mod session_state_machine;
pub mod states;
pub mod step_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{ErrorKind, SessionEvent, StepEvent};
pub use session_state_machine::SessionStateMachine;
pub use states::{
    AssertionState, ComparisonResult, ExecutionState, PipelinePhase, SessionState, TimingPhase,
};
pub use step_state_machine::StepStateMachine;
