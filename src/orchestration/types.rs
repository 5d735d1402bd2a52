//! # Orchestration Types
//!
//! Scenario definitions handed to the orchestrator, the [`StepExecutor`] seam
//! through which steps are actually run, and the report returned at the end of
//! a session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::TestCounts;
use crate::models::{AssertionType, ErrorRecord, Evidence, Execution, OrchestrationSession, StepResult};
use crate::state_machine::{ComparisonResult, ErrorKind, SessionState};

/// One test scenario: an ordered list of steps run by a single worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: String,
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl ScenarioDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Name under which a step of this scenario is counted on the session
    pub fn session_step_name(&self, step: &StepDefinition) -> String {
        format!("{}::{}", self.id, step.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    pub name: String,
    pub expected_result: Option<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionDefinition>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            expected_result: None,
            assertions: Vec::new(),
        }
    }

    pub fn expecting(mut self, expected_result: impl Into<String>) -> Self {
        self.expected_result = Some(expected_result.into());
        self
    }

    pub fn with_assertion(mut self, assertion: AssertionDefinition) -> Self {
        self.assertions.push(assertion);
        self
    }
}

/// Declared check on a step's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionDefinition {
    pub name: String,
    pub assertion_type: AssertionType,
    pub expected_value: Option<String>,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub is_optional: bool,
    pub source_path: Option<String>,
}

impl AssertionDefinition {
    pub fn new(
        name: impl Into<String>,
        assertion_type: AssertionType,
        expected_value: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            assertion_type,
            expected_value,
            is_critical: false,
            is_optional: false,
            source_path: None,
        }
    }

    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn at(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }
}

/// Everything a [`StepExecutor`] gets to know about the step it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    pub session_id: String,
    pub execution_id: String,
    pub step_result_id: String,
    pub scenario_id: String,
    pub step: StepDefinition,
    /// 1-based
    pub attempt: u32,
}

/// Observed value for a declared assertion.
///
/// With `passed: None` the orchestrator evaluates built-in comparison types
/// itself; external types then end in ERROR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub name: String,
    pub actual_value: String,
    pub passed: Option<bool>,
}

impl AssertionOutcome {
    pub fn observed(name: impl Into<String>, actual_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actual_value: actual_value.into(),
            passed: None,
        }
    }

    pub fn judged(name: impl Into<String>, actual_value: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            actual_value: actual_value.into(),
            passed: Some(passed),
        }
    }
}

/// What a collaborator reports back after running a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub passed: bool,
    pub actual_result: Option<String>,
    pub comparison: Option<ComparisonResult>,
    pub assertion_outcomes: Vec<AssertionOutcome>,
    pub tests: Option<TestCounts>,
    pub metrics: BTreeMap<String, String>,
    pub performance_metrics: BTreeMap<String, String>,
    pub security_metrics: BTreeMap<String, String>,
    pub quality_metrics: BTreeMap<String, String>,
    pub validation_checks: Vec<String>,
    pub failed_validations: Vec<String>,
    pub security_findings: Vec<String>,
    pub vulnerabilities: Vec<String>,
    pub warnings: Vec<String>,
    pub artifacts: Vec<String>,
}

impl StepReport {
    pub fn passed() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn with_actual(mut self, actual_result: impl Into<String>) -> Self {
        self.actual_result = Some(actual_result.into());
        self
    }

    pub fn with_outcome(mut self, outcome: AssertionOutcome) -> Self {
        self.assertion_outcomes.push(outcome);
        self
    }

    pub fn with_tests(mut self, tests: TestCounts) -> Self {
        self.tests = Some(tests);
        self
    }

    pub fn with_performance_metric(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.performance_metrics.insert(key.into(), value.into());
        self
    }

    pub fn with_security_metric(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.security_metrics.insert(key.into(), value.into());
        self
    }

    pub fn with_security_finding(mut self, finding: impl Into<String>) -> Self {
        self.security_findings.push(finding.into());
        self
    }

    pub fn with_vulnerability(mut self, vulnerability: impl Into<String>) -> Self {
        self.vulnerabilities.push(vulnerability.into());
        self
    }

    pub fn with_validation(mut self, check: impl Into<String>, passed: bool) -> Self {
        let check = check.into();
        if !passed {
            self.failed_validations.push(check.clone());
        }
        self.validation_checks.push(check);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// A step that could not be run to a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFault {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
    pub evidence: Option<Evidence>,
}

impl ExternalFault {
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
            evidence: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

impl fmt::Display for ExternalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl std::error::Error for ExternalFault {}

/// Collaborator seam: runs one step and reports what happened.
///
/// Implementations own all I/O. The orchestrator enforces the step deadline.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(&self, context: &StepContext) -> Result<StepReport, ExternalFault>;

    /// Name used as the ledger `source` for faults without one
    fn executor_name(&self) -> &str {
        "step_executor"
    }
}

/// Everything one scenario worker produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub execution: Execution,
    pub step_results: Vec<StepResult>,
}

/// Final view of a session run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: OrchestrationSession,
    pub runs: Vec<ScenarioRun>,
    pub ledger_entries: Vec<ErrorRecord>,
}

impl SessionReport {
    pub fn status(&self) -> SessionState {
        self.session.status
    }

    pub fn executions(&self) -> impl Iterator<Item = &Execution> {
        self.runs.iter().map(|run| &run.execution)
    }

    pub fn step_results(&self) -> impl Iterator<Item = &StepResult> {
        self.runs.iter().flat_map(|run| run.step_results.iter())
    }
}
