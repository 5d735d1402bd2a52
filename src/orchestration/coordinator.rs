//! # Session Coordinator
//!
//! Actor that exclusively owns one [`OrchestrationSession`]. Workers talk to
//! it through a cloneable [`SessionHandle`]; every command is a message on a
//! tokio `mpsc` channel answered through a `oneshot`. After each command the
//! coordinator publishes an `Arc` snapshot on a `watch` channel, so readers
//! never block the owner and always see a consistent session.
//!
//! ```text
//! worker ──┐                         ┌──▶ watch<Arc<OrchestrationSession>>
//! worker ──┼─▶ mpsc<SessionCommand> ─┤
//! worker ──┘                         └──▶ EventPublisher (status transitions)
//! ```

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::constants::{build_session_transition_map, session_transition_event, SessionTransitionMap};
use crate::events::EventPublisher;
use crate::ledger::{ErrorLedger, FaultReport};
use crate::logging::log_session_operation;
use crate::metrics::{telemetry, ScoreSet};
use crate::models::{ErrorRecord, OrchestrationSession, SessionError, SessionResult};
use crate::state_machine::{PipelinePhase, SessionState, TimingPhase};

/// Default depth of the command channel
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Session coordinator is no longer running")]
    ChannelClosed,

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Type alias for command response channels
pub type CommandResponder<T> = oneshot::Sender<SessionResult<T>>;

/// Commands accepted by the coordinator, one per session operation
#[derive(Debug)]
pub enum SessionCommand {
    AddStep {
        name: String,
        resp: CommandResponder<bool>,
    },
    Start {
        resp: CommandResponder<()>,
    },
    EnterPhase {
        phase: PipelinePhase,
        resp: CommandResponder<()>,
    },
    RecordTiming {
        phase: TimingPhase,
        duration_ms: i64,
        resp: CommandResponder<()>,
    },
    CompleteStep {
        name: String,
        success: bool,
        resp: CommandResponder<()>,
    },
    SkipStep {
        name: String,
        resp: CommandResponder<()>,
    },
    /// Written to the ledger first, then counted on the session
    AddError {
        message: String,
        report: Box<FaultReport>,
        resp: CommandResponder<ErrorRecord>,
    },
    AddWarning {
        warning: String,
        resp: CommandResponder<bool>,
    },
    AddArtifact {
        path: String,
        resp: CommandResponder<bool>,
    },
    RefreshScores {
        execution_scores: Vec<ScoreSet>,
        resp: CommandResponder<ScoreSet>,
    },
    Complete {
        success: bool,
        resp: CommandResponder<SessionState>,
    },
    Cancel {
        resp: CommandResponder<()>,
    },
    Timeout {
        resp: CommandResponder<()>,
    },
    Retry {
        reason: String,
        resp: CommandResponder<()>,
    },
}

pub struct SessionCoordinator {
    session: OrchestrationSession,
    ledger: ErrorLedger,
    publisher: EventPublisher,
    transitions: SessionTransitionMap,
    observed_status: SessionState,
    snapshot_tx: watch::Sender<Arc<OrchestrationSession>>,
}

impl SessionCoordinator {
    /// Move `session` into a new coordinator task and return a handle to it.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(session: OrchestrationSession, ledger: ErrorLedger, command_buffer: usize) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(session.clone()));

        let coordinator = Self {
            observed_status: session.status,
            publisher: ledger.publisher().clone(),
            session,
            ledger,
            transitions: build_session_transition_map(),
            snapshot_tx,
        };

        tokio::spawn(coordinator.run(command_rx));

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        debug!(session_id = %self.session.id, "Session coordinator started");
        while let Some(command) = commands.recv().await {
            self.process_command(command);
        }
        debug!(session_id = %self.session.id, "Session coordinator stopped");
    }

    fn process_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AddStep { name, resp } => {
                let added = self.session.add_step(name);
                self.reply(resp, Ok(added), "add_step");
            }
            SessionCommand::Start { resp } => {
                let result = self.session.start();
                self.reply(resp, result, "start");
            }
            SessionCommand::EnterPhase { phase, resp } => {
                let result = self.session.enter_phase(phase);
                self.reply(resp, result, "enter_phase");
            }
            SessionCommand::RecordTiming {
                phase,
                duration_ms,
                resp,
            } => {
                self.session.record_timing(phase, duration_ms);
                self.reply(resp, Ok(()), "record_timing");
            }
            SessionCommand::CompleteStep {
                name,
                success,
                resp,
            } => {
                let result = self.session.complete_step(&name, success);
                self.reply(resp, result, "complete_step");
            }
            SessionCommand::SkipStep { name, resp } => {
                let result = self.session.skip_step(&name);
                self.reply(resp, result, "skip_step");
            }
            SessionCommand::AddError {
                message,
                report,
                resp,
            } => {
                let record = self
                    .ledger
                    .record_fault(report.for_session(self.session.id.clone()));
                self.session
                    .add_error(message, Some(record.correlation_id.clone()));
                self.reply(resp, Ok(record), "add_error");
            }
            SessionCommand::AddWarning { warning, resp } => {
                let added = self.session.add_warning(warning);
                self.reply(resp, Ok(added), "add_warning");
            }
            SessionCommand::AddArtifact { path, resp } => {
                let added = self.session.add_artifact(path);
                self.reply(resp, Ok(added), "add_artifact");
            }
            SessionCommand::RefreshScores {
                execution_scores,
                resp,
            } => {
                self.session.refresh_scores(&execution_scores);
                let scores = self.session.scores;
                self.reply(resp, Ok(scores), "refresh_scores");
            }
            SessionCommand::Complete { success, resp } => {
                let result = self.session.complete(success);
                self.reply(resp, result, "complete");
            }
            SessionCommand::Cancel { resp } => {
                let result = self.session.cancel();
                self.reply(resp, result, "cancel");
            }
            SessionCommand::Timeout { resp } => {
                let result = self.session.timeout();
                self.reply(resp, result, "timeout");
            }
            SessionCommand::Retry { reason, resp } => {
                let previous_id = self.session.id.clone();
                let result = self.session.retry(reason);
                if result.is_ok() {
                    debug!(previous_id = %previous_id, session_id = %self.session.id, "Session re-keyed for retry");
                }
                self.reply(resp, result, "retry");
            }
        }
    }

    /// Publish the new snapshot, then answer. A caller that reads the
    /// snapshot after its reply always sees its own change.
    fn reply<T>(&mut self, resp: CommandResponder<T>, result: SessionResult<T>, operation: &str) {
        if let Err(error) = &result {
            warn!(
                session_id = %self.session.id,
                operation = %operation,
                error = %error,
                "Session command rejected"
            );
        }

        self.observe_transition();
        self.snapshot_tx.send_replace(Arc::new(self.session.clone()));

        // The caller may have given up waiting; the change stands either way
        let _ = resp.send(result);
    }

    fn observe_transition(&mut self) {
        let from = self.observed_status;
        let to = self.session.status;
        if from == to {
            return;
        }
        self.observed_status = to;

        log_session_operation(
            "transition",
            &self.session.id,
            Some(&self.session.name),
            &to.to_string(),
            Some(&format!("from {from}")),
        );

        if let Some(event_name) = session_transition_event(&self.transitions, from, to) {
            self.publisher.publish(
                event_name,
                json!({
                    "session_id": self.session.id,
                    "session_name": self.session.name,
                    "from": from,
                    "to": to,
                    "severity": self.session.severity,
                    "retry_count": self.session.retry_count,
                    "retry_of_session_id": self.session.retry_of_session_id,
                }),
            );
        }

        if to.is_terminal() {
            telemetry::record_session_completed(to, self.session.total_duration_ms);
        }
    }
}

/// Cloneable access to a running [`SessionCoordinator`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Arc<OrchestrationSession>>,
}

impl SessionHandle {
    /// Latest published state of the session
    pub fn snapshot(&self) -> Arc<OrchestrationSession> {
        self.snapshots.borrow().clone()
    }

    /// Current id; it changes when the session is retried
    pub fn session_id(&self) -> String {
        self.snapshots.borrow().id.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<OrchestrationSession>> {
        self.snapshots.clone()
    }

    /// Resolve once the session reaches a terminal status
    pub async fn wait_for_completion(&self) -> CoordinatorResult<Arc<OrchestrationSession>> {
        let mut snapshots = self.snapshots.clone();
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.is_completed() {
                return Ok(snapshot);
            }
            snapshots
                .changed()
                .await
                .map_err(|_| CoordinatorError::ChannelClosed)?;
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(CommandResponder<T>) -> SessionCommand,
    ) -> CoordinatorResult<T> {
        let (resp, rx) = oneshot::channel();
        self.commands
            .send(build(resp))
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        let result = rx.await.map_err(|_| CoordinatorError::ChannelClosed)?;
        Ok(result?)
    }

    pub async fn add_step(&self, name: impl Into<String>) -> CoordinatorResult<bool> {
        let name = name.into();
        self.request(|resp| SessionCommand::AddStep { name, resp }).await
    }

    pub async fn start(&self) -> CoordinatorResult<()> {
        self.request(|resp| SessionCommand::Start { resp }).await
    }

    pub async fn enter_phase(&self, phase: PipelinePhase) -> CoordinatorResult<()> {
        self.request(|resp| SessionCommand::EnterPhase { phase, resp })
            .await
    }

    pub async fn record_timing(&self, phase: TimingPhase, duration_ms: i64) -> CoordinatorResult<()> {
        self.request(|resp| SessionCommand::RecordTiming {
            phase,
            duration_ms,
            resp,
        })
        .await
    }

    pub async fn complete_step(&self, name: impl Into<String>, success: bool) -> CoordinatorResult<()> {
        let name = name.into();
        self.request(|resp| SessionCommand::CompleteStep {
            name,
            success,
            resp,
        })
        .await
    }

    pub async fn skip_step(&self, name: impl Into<String>) -> CoordinatorResult<()> {
        let name = name.into();
        self.request(|resp| SessionCommand::SkipStep { name, resp })
            .await
    }

    /// Record the fault in the ledger and count it on the session. Returns
    /// the ledger entry; its correlation id is kept on the session.
    pub async fn add_error(
        &self,
        message: impl Into<String>,
        report: FaultReport,
    ) -> CoordinatorResult<ErrorRecord> {
        let message = message.into();
        self.request(|resp| SessionCommand::AddError {
            message,
            report: Box::new(report),
            resp,
        })
        .await
    }

    pub async fn add_warning(&self, warning: impl Into<String>) -> CoordinatorResult<bool> {
        let warning = warning.into();
        self.request(|resp| SessionCommand::AddWarning { warning, resp })
            .await
    }

    pub async fn add_artifact(&self, path: impl Into<String>) -> CoordinatorResult<bool> {
        let path = path.into();
        self.request(|resp| SessionCommand::AddArtifact { path, resp })
            .await
    }

    pub async fn refresh_scores(&self, execution_scores: Vec<ScoreSet>) -> CoordinatorResult<ScoreSet> {
        self.request(|resp| SessionCommand::RefreshScores {
            execution_scores,
            resp,
        })
        .await
    }

    pub async fn complete(&self, success: bool) -> CoordinatorResult<SessionState> {
        self.request(|resp| SessionCommand::Complete { success, resp })
            .await
    }

    pub async fn cancel(&self) -> CoordinatorResult<()> {
        self.request(|resp| SessionCommand::Cancel { resp }).await
    }

    pub async fn timeout(&self) -> CoordinatorResult<()> {
        self.request(|resp| SessionCommand::Timeout { resp }).await
    }

    pub async fn retry(&self, reason: impl Into<String>) -> CoordinatorResult<()> {
        let reason = reason.into();
        self.request(|resp| SessionCommand::Retry { reason, resp })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::events;
    use crate::ids::{SequentialIdGenerator, SharedIdGenerator};
    use crate::models::{FaultKind, SeverityLevel};
    use tokio_test::assert_ok;

    fn spawn_session() -> (SessionHandle, ErrorLedger) {
        let ids: SharedIdGenerator = Arc::new(SequentialIdGenerator::new());
        let ledger = ErrorLedger::new(ids.clone(), EventPublisher::new(64));
        let session = OrchestrationSession::new(ids.as_ref(), "owasp sweep", "ci", 1);
        let handle = SessionCoordinator::spawn(session, ledger.clone(), 16);
        (handle, ledger)
    }

    #[tokio::test]
    async fn test_commands_update_snapshot() {
        let (handle, _ledger) = spawn_session();

        assert!(assert_ok!(handle.add_step("s1").await));
        assert!(!assert_ok!(handle.add_step("s1").await));
        assert_ok!(handle.start().await);
        assert_ok!(handle.complete_step("s1", true).await);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, SessionState::InProgress);
        assert_eq!(snapshot.total_steps, 1);
        assert_eq!(snapshot.passed_steps, 1);
        assert_eq!(snapshot.completed_steps, 1);
    }

    #[tokio::test]
    async fn test_rejected_commands_surface_session_errors() {
        let (handle, _ledger) = spawn_session();

        let result = handle.complete_step("never-added", true).await;
        assert!(matches!(
            result,
            Err(CoordinatorError::Session(SessionError::UnknownStep { .. }))
        ));

        let retry = handle.retry("not failed yet").await;
        assert!(matches!(
            retry,
            Err(CoordinatorError::Session(SessionError::RetryNotAllowed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_add_error_writes_ledger_before_session() {
        let (handle, ledger) = spawn_session();
        assert_ok!(handle.start().await);

        let record = assert_ok!(
            handle
                .add_error("boom", FaultReport::new("provider crashed", FaultKind::System))
                .await
        );
        let status = assert_ok!(handle.complete(false).await);

        assert_eq!(status, SessionState::Error);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.ledger_correlation_ids(), &[record.correlation_id.clone()]);
        assert_eq!(snapshot.severity, SeverityLevel::Critical);

        let stored = ledger.get(&record.correlation_id).unwrap();
        assert_eq!(stored.session_id.as_deref(), Some(snapshot.id.as_str()));
        assert!(ledger.has_blocking_entries(&snapshot.id));
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let (handle, ledger) = spawn_session();
        let mut events_rx = ledger.publisher().subscribe();

        assert_ok!(handle.start().await);
        assert_ok!(handle.complete(true).await);

        let started = events_rx.recv().await.unwrap();
        assert_eq!(started.name, events::SESSION_STARTED);
        let completed = events_rx.recv().await.unwrap();
        assert_eq!(completed.name, events::SESSION_COMPLETED);
        assert_eq!(completed.context["to"], "completed");
    }

    #[tokio::test]
    async fn test_retry_rekeys_the_session() {
        let (handle, _ledger) = spawn_session();
        let original_id = handle.session_id();

        assert_ok!(handle.start().await);
        assert_ok!(handle.complete(false).await);
        assert_ok!(handle.retry("flaky upstream").await);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, SessionState::Pending);
        assert_eq!(snapshot.retry_of_session_id.as_deref(), Some(original_id.as_str()));
        assert_eq!(handle.session_id(), format!("{original_id}_retry_1"));
    }

    #[tokio::test]
    async fn test_wait_for_completion() {
        let (handle, _ledger) = spawn_session();
        let waiter = handle.clone();
        let waiting = tokio::spawn(async move { waiter.wait_for_completion().await });

        assert_ok!(handle.start().await);
        assert_ok!(handle.cancel().await);

        let snapshot = assert_ok!(waiting.await.unwrap());
        assert_eq!(snapshot.status, SessionState::Cancelled);
    }
}
