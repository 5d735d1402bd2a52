//! # Campaign Models
//!
//! The entity hierarchy: a session owns executions, an execution owns step
//! results, a step result owns assertions. Error records live beside the
//! hierarchy and are correlated to it by id.

pub mod assertion;
pub mod error_record;
pub mod execution;
pub mod lifecycle;
pub mod session;
pub mod severity;
pub mod step_result;

// Re-export models for easy access
pub use assertion::{Assertion, AssertionType};
pub use error_record::{ErrorRecord, Evidence, FaultKind, Resolution};
pub use execution::{Execution, StepCounts, StepOutcome};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleResult};
pub use session::{AuditEntry, OrchestrationSession, PhaseTimings, SessionError, SessionResult};
pub use severity::{LogLevel, SeverityLevel};
pub use step_result::StepResult;
