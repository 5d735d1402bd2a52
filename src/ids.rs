//! # Identifier Generation
//!
//! Every entity in the core receives its identity from an [`IdGenerator`]
//! supplied by the caller. Production code uses [`UuidIdGenerator`]; tests use
//! [`SequentialIdGenerator`] so identifiers are predictable.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of entity an identifier is generated for. Used as the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Session,
    Execution,
    StepResult,
    Assertion,
    Correlation,
}

impl IdKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Execution => "execution",
            Self::StepResult => "step",
            Self::Assertion => "assertion",
            Self::Correlation => "fault",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Capability for minting unique identifiers.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn next_id(&self, kind: IdKind) -> String;
}

/// Shared generator handle passed around the orchestrator.
pub type SharedIdGenerator = Arc<dyn IdGenerator>;

/// Random v4 UUID identifiers, e.g. `session-0b8d...`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, kind: IdKind) -> String {
        format!("{}-{}", kind.prefix(), Uuid::new_v4())
    }
}

/// Monotonic counter identifiers, e.g. `session-1`, `step-2`.
///
/// The counter is shared across kinds so every id handed out is unique.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, kind: IdKind) -> String {
        let next = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{next}", kind.prefix())
    }
}

const RETRY_MARKER: &str = "_retry_";

/// Identifier for the `attempt`-th retry of an entity, e.g. `session-1_retry_2`.
///
/// Retries of retries are derived from the original id, so the suffix never
/// stacks.
pub fn retry_id(previous: &str, attempt: u32) -> String {
    let original = previous
        .split_once(RETRY_MARKER)
        .map_or(previous, |(original, _)| original);
    format!("{original}{RETRY_MARKER}{attempt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_predictable() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id(IdKind::Session), "session-1");
        assert_eq!(ids.next_id(IdKind::StepResult), "step-2");
        assert_eq!(ids.next_id(IdKind::Correlation), "fault-3");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidIdGenerator;
        let generated: HashSet<String> = (0..100).map(|_| ids.next_id(IdKind::Execution)).collect();
        assert_eq!(generated.len(), 100);
        assert!(generated.iter().all(|id| id.starts_with("execution-")));
    }

    #[test]
    fn test_retry_ids_do_not_stack() {
        assert_eq!(retry_id("session-4", 1), "session-4_retry_1");
        assert_eq!(retry_id("session-4_retry_1", 2), "session-4_retry_2");
    }
}
