//! # Orchestrator
//!
//! Drives a session through its pipeline:
//!
//! ```text
//! PREPARING ─▶ IN_PROGRESS ─▶ EXECUTING_TESTS ─▶ ANALYZING_RESULTS ─▶ GENERATING_REPORT ─▶ terminal
//!                               │
//!                               └─ scenarios, sequential or bounded-parallel,
//!                                  each step under its own deadline
//! ```
//!
//! The execution phase as a whole runs under the session deadline. Workers
//! bound every step by what is left of it, so each scenario comes back as a
//! run even when the deadline cuts it short; the session is then timed out.
//! Retries are never automatic: callers use [`Orchestrator::rerun_session`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout_at;
use tracing::{info, instrument, warn};

use super::coordinator::{SessionCoordinator, SessionHandle, DEFAULT_COMMAND_BUFFER};
use super::registry::SessionRegistry;
use super::types::{ScenarioDefinition, ScenarioRun, SessionReport, StepExecutor};
use super::worker::{ScenarioWorker, WorkerOutcome};
use crate::config::{CampaignConfig, ConfigManager};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::ids::SharedIdGenerator;
use crate::ledger::{ErrorLedger, FaultReport};
use crate::logging::{log_error, log_session_operation};
use crate::metrics::ScoreSet;
use crate::models::OrchestrationSession;
use crate::state_machine::{ErrorKind, ExecutionState, PipelinePhase, TimingPhase};

pub struct Orchestrator {
    config: Arc<CampaignConfig>,
    ids: SharedIdGenerator,
    executor: Arc<dyn StepExecutor>,
    ledger: ErrorLedger,
    registry: SessionRegistry,
    step_timeout: Duration,
    session_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: CampaignConfig, ids: SharedIdGenerator, executor: Arc<dyn StepExecutor>) -> Self {
        let publisher = EventPublisher::new(config.ledger.alert_channel_capacity);
        let ledger = ErrorLedger::from_config(&config.ledger, ids.clone(), publisher);
        Self {
            step_timeout: config.step_timeout(),
            session_timeout: config.session_timeout(),
            config: Arc::new(config),
            ids,
            executor,
            ledger,
            registry: SessionRegistry::new(),
        }
    }

    pub fn from_manager(manager: &ConfigManager, ids: SharedIdGenerator, executor: Arc<dyn StepExecutor>) -> Self {
        Self::new(manager.config().clone(), ids, executor)
    }

    /// Replace the ledger, e.g. one with a custom classifier
    pub fn with_ledger(mut self, ledger: ErrorLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Override the configured deadlines with finer-grained ones
    pub fn with_timeouts(mut self, step_timeout: Duration, session_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self.session_timeout = session_timeout;
        self
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    pub fn publisher(&self) -> &EventPublisher {
        self.ledger.publisher()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// New PENDING session carrying the configured retry budget and
    /// execution mode
    pub fn new_session(&self, name: impl Into<String>, initiated_by: impl Into<String>) -> OrchestrationSession {
        OrchestrationSession::new(
            self.ids.as_ref(),
            name,
            initiated_by,
            self.config.session.max_retries,
        )
        .parallel(self.config.execution.parallel_execution)
    }

    /// Hand `session` to a coordinator and register its handle
    pub fn spawn_session(&self, session: OrchestrationSession) -> SessionHandle {
        let handle = SessionCoordinator::spawn(session, self.ledger.clone(), DEFAULT_COMMAND_BUFFER);
        self.registry.register(handle.clone());
        handle
    }

    /// Run `scenarios` for a fresh session through the whole pipeline
    pub async fn run_session(
        &self,
        session: OrchestrationSession,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Result<SessionReport> {
        let handle = self.spawn_session(session);
        self.execute_pipeline(&handle, scenarios).await
    }

    /// Retry a FAILED or ERROR session and run it again
    pub async fn rerun_session(
        &self,
        handle: &SessionHandle,
        reason: impl Into<String>,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Result<SessionReport> {
        let previous_id = handle.session_id();
        handle.retry(reason).await?;
        self.registry.rekey(&previous_id, handle.clone());
        self.execute_pipeline(handle, scenarios).await
    }

    #[instrument(skip(self, handle, scenarios), fields(session_id = %handle.session_id(), scenarios = scenarios.len()))]
    async fn execute_pipeline(
        &self,
        handle: &SessionHandle,
        scenarios: Vec<ScenarioDefinition>,
    ) -> Result<SessionReport> {
        let preparation = Instant::now();
        handle.enter_phase(PipelinePhase::Preparing).await?;
        for scenario in &scenarios {
            for step in &scenario.steps {
                handle.add_step(scenario.session_step_name(step)).await?;
            }
        }
        handle.start().await?;
        handle
            .record_timing(TimingPhase::Preparation, elapsed_ms(preparation))
            .await?;

        handle.enter_phase(PipelinePhase::ExecutingTests).await?;
        let snapshot = handle.snapshot();
        let expected_runs = scenarios.len();
        let worker = ScenarioWorker {
            session_id: snapshot.id.clone(),
            handle: handle.clone(),
            executor: self.executor.clone(),
            publisher: self.publisher().clone(),
            ids: self.ids.clone(),
            step_timeout: self.step_timeout,
            deadline: tokio::time::Instant::now() + self.session_timeout,
            step_max_retries: self.config.step.max_retries,
            execution_max_retries: self.config.execution.max_retries,
        };

        let execution = Instant::now();
        let (runs, timed_out) = if snapshot.is_parallel_execution {
            self.run_parallel(worker, scenarios).await
        } else {
            self.run_sequential(worker, scenarios).await
        };
        handle
            .record_timing(TimingPhase::Execution, elapsed_ms(execution))
            .await?;

        if timed_out {
            self.expire(handle).await?;
            return Ok(self.report(handle, runs));
        }

        if handle.snapshot().is_completed() {
            // Cancelled from outside while scenarios were running
            return Ok(self.report(handle, runs));
        }

        let analysis = Instant::now();
        handle.enter_phase(PipelinePhase::AnalyzingResults).await?;
        let execution_scores: Vec<ScoreSet> = runs.iter().map(|run| run.execution.scores).collect();
        handle.refresh_scores(execution_scores).await?;
        handle
            .record_timing(TimingPhase::Analysis, elapsed_ms(analysis))
            .await?;

        let cleanup = Instant::now();
        handle.enter_phase(PipelinePhase::GeneratingReport).await?;
        let success = runs.len() == expected_runs
            && runs
                .iter()
                .all(|run| run.execution.status() == ExecutionState::Passed);
        let status = handle.complete(success).await?;
        handle
            .record_timing(TimingPhase::Cleanup, elapsed_ms(cleanup))
            .await?;

        info!(
            session_id = %handle.session_id(),
            status = %status,
            executions = runs.len(),
            "Session finished"
        );

        Ok(self.report(handle, runs))
    }

    async fn run_sequential(
        &self,
        worker: ScenarioWorker,
        scenarios: Vec<ScenarioDefinition>,
    ) -> (Vec<ScenarioRun>, bool) {
        let mut outcomes = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            outcomes.push(worker.run(scenario).await);
        }
        collect_runs(outcomes)
    }

    /// One task per scenario, at most `max_concurrent_executions` running.
    /// Runs are collected as they finish and returned in declaration order.
    async fn run_parallel(
        &self,
        worker: ScenarioWorker,
        scenarios: Vec<ScenarioDefinition>,
    ) -> (Vec<ScenarioRun>, bool) {
        let permits = self.config.execution.max_concurrent_executions.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut tasks = JoinSet::new();
        for (index, scenario) in scenarios.into_iter().enumerate() {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                // Past the deadline the worker skips every step without a permit
                let _permit = timeout_at(worker.deadline, semaphore.acquire_owned())
                    .await
                    .ok()
                    .and_then(|acquired| acquired.ok());
                (index, worker.run(scenario).await)
            });
        }

        let mut finished = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => finished.push(entry),
                Err(e) => log_error("orchestrator", "run_scenario", &e.to_string(), None),
            }
        }
        finished.sort_by_key(|(index, _)| *index);
        collect_runs(finished.into_iter().map(|(_, outcome)| outcome).collect())
    }

    /// Session deadline passed: ledger entry, then the TIMEOUT path
    async fn expire(&self, handle: &SessionHandle) -> Result<()> {
        if handle.snapshot().is_completed() {
            // Cancelled while the deadline ran out
            return Ok(());
        }
        let session_id = handle.session_id();
        let message = format!(
            "Session exceeded its {}ms deadline",
            self.session_timeout.as_millis()
        );
        warn!(session_id = %session_id, "{message}");

        self.ledger.record_fault(
            FaultReport::from_error_kind(message, ErrorKind::Timeout)
                .for_session(session_id.clone())
                .with_source("orchestrator"),
        );
        handle.timeout().await?;
        log_session_operation("timeout", &session_id, None, "timeout", None);
        Ok(())
    }

    fn report(&self, handle: &SessionHandle, runs: Vec<ScenarioRun>) -> SessionReport {
        let session = handle.snapshot().as_ref().clone();
        let ledger_entries = self.ledger.for_session(&session.id);
        SessionReport {
            session,
            runs,
            ledger_entries,
        }
    }
}

fn collect_runs(outcomes: Vec<WorkerOutcome>) -> (Vec<ScenarioRun>, bool) {
    let deadline_reached = outcomes.iter().any(|outcome| outcome.deadline_reached);
    let runs = outcomes.into_iter().map(|outcome| outcome.run).collect();
    (runs, deadline_reached)
}

fn elapsed_ms(since: Instant) -> i64 {
    since.elapsed().as_millis() as i64
}
