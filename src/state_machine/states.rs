use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestration session state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Initial state when the session is created or reset for retry
    #[default]
    Pending,
    /// Inputs are being gathered before the session starts
    Preparing,
    /// Session has started
    InProgress,
    /// Scenario executions are running
    ExecutingTests,
    /// Results are being aggregated and scored
    AnalyzingResults,
    /// Final report is being assembled
    GeneratingReport,
    /// All steps finished without errors and the session succeeded
    Completed,
    /// Steps finished but at least one test failed
    Failed,
    /// The system itself broke while running the session
    Error,
    /// Explicitly cancelled by the orchestrator
    Cancelled,
    /// Deadline expired before the session finished
    Timeout,
}

impl SessionState {
    /// Check if this is a terminal state (no further transitions except retry)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Error | Self::Cancelled | Self::Timeout
        )
    }

    /// Advisory phases the orchestrator moves through while the session runs
    pub fn is_intermediate(&self) -> bool {
        matches!(
            self,
            Self::Preparing
                | Self::InProgress
                | Self::ExecutingTests
                | Self::AnalyzingResults
                | Self::GeneratingReport
        )
    }

    /// Terminal states a session may be retried from
    pub fn allows_retry(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Preparing => write!(f, "preparing"),
            Self::InProgress => write!(f, "in_progress"),
            Self::ExecutingTests => write!(f, "executing_tests"),
            Self::AnalyzingResults => write!(f, "analyzing_results"),
            Self::GeneratingReport => write!(f, "generating_report"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "in_progress" => Ok(Self::InProgress),
            "executing_tests" => Ok(Self::ExecutingTests),
            "analyzing_results" => Ok(Self::AnalyzingResults),
            "generating_report" => Ok(Self::GeneratingReport),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("Invalid session state: {s}")),
        }
    }
}

/// Execution and step result state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created, not yet started
    #[default]
    Pending,
    /// Currently running
    InProgress,
    /// Finished successfully
    Passed,
    /// Finished, but the checks did not hold
    Failed,
    /// An error prevented the unit from finishing
    Error,
    /// Not run
    Skipped,
    /// Deadline expired
    Timeout,
    /// Explicitly cancelled
    Cancelled,
}

impl ExecutionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Failed checks or a broken run
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error | Self::Timeout)
    }

    /// Errored runs, which count against the system rather than the tests
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            "timeout" => Ok(Self::Timeout),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid execution state: {s}")),
        }
    }
}

/// Assertion state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssertionState {
    #[default]
    Pending,
    Passed,
    Failed,
    Skipped,
    Error,
    Timeout,
}

impl AssertionState {
    pub fn is_evaluated(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for AssertionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for AssertionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("Invalid assertion state: {s}")),
        }
    }
}

/// Outcome of comparing expected against actual step output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonResult {
    #[default]
    NotCompared,
    Match,
    Mismatch,
    PartialMatch,
}

/// Advisory pipeline phases a running session can enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Preparing,
    ExecutingTests,
    AnalyzingResults,
    GeneratingReport,
}

impl PipelinePhase {
    pub fn state(&self) -> SessionState {
        match self {
            Self::Preparing => SessionState::Preparing,
            Self::ExecutingTests => SessionState::ExecutingTests,
            Self::AnalyzingResults => SessionState::AnalyzingResults,
            Self::GeneratingReport => SessionState::GeneratingReport,
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state().fmt(f)
    }
}

/// Phases whose wall-clock duration is recorded on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingPhase {
    Preparation,
    Execution,
    Analysis,
    Cleanup,
}

impl fmt::Display for TimingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparation => write!(f, "preparation"),
            Self::Execution => write!(f, "execution"),
            Self::Analysis => write!(f, "analysis"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

impl std::str::FromStr for TimingPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preparation" => Ok(Self::Preparation),
            "execution" => Ok(Self::Execution),
            "analysis" => Ok(Self::Analysis),
            "cleanup" => Ok(Self::Cleanup),
            _ => Err(format!("Invalid timing phase: {s}")),
        }
    }
}
