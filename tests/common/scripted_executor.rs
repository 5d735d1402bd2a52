use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use campaign_core::orchestration::{ExternalFault, StepContext, StepExecutor, StepReport};
use campaign_core::state_machine::ErrorKind;

/// What the scripted executor does when it sees a step id
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    Report(StepReport),
    Fault(ErrorKind, String),
    /// Sleep, then report
    Slow(Duration, StepReport),
    /// Fail the first `n` calls for the step, pass afterwards
    Flaky(usize),
}

/// Step executor that replays canned behavior per step id and records every
/// context it was handed. Unscripted steps pass.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: HashMap<String, ScriptedBehavior>,
    calls: Mutex<Vec<StepContext>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, step_id: &str, behavior: ScriptedBehavior) -> Self {
        self.script.insert(step_id.to_string(), behavior);
        self
    }

    pub fn failing(self, step_id: &str) -> Self {
        self.on(step_id, ScriptedBehavior::Report(StepReport::failed()))
    }

    pub fn reporting(self, step_id: &str, report: StepReport) -> Self {
        self.on(step_id, ScriptedBehavior::Report(report))
    }

    pub fn faulting(self, step_id: &str, kind: ErrorKind, message: &str) -> Self {
        self.on(step_id, ScriptedBehavior::Fault(kind, message.to_string()))
    }

    pub fn slow(self, step_id: &str, delay: Duration) -> Self {
        self.on(step_id, ScriptedBehavior::Slow(delay, StepReport::passed()))
    }

    pub fn flaky(self, step_id: &str, failures: usize) -> Self {
        self.on(step_id, ScriptedBehavior::Flaky(failures))
    }

    pub fn calls(&self) -> Vec<StepContext> {
        self.calls.lock().clone()
    }

    pub fn executed_step_ids(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.step.id.clone()).collect()
    }

    /// Most steps that were ever running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, context: &StepContext, calls_for_step: usize) -> Result<StepReport, ExternalFault> {
        match self.script.get(&context.step.id) {
            None => Ok(StepReport::passed()),
            Some(ScriptedBehavior::Report(report)) => Ok(report.clone()),
            Some(ScriptedBehavior::Fault(kind, message)) => {
                Err(ExternalFault::new(message.clone(), *kind).with_source("scripted_executor"))
            }
            Some(ScriptedBehavior::Slow(delay, report)) => {
                tokio::time::sleep(*delay).await;
                Ok(report.clone())
            }
            Some(ScriptedBehavior::Flaky(failures)) => {
                if calls_for_step <= *failures {
                    Ok(StepReport::failed())
                } else {
                    Ok(StepReport::passed())
                }
            }
        }
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute_step(&self, context: &StepContext) -> Result<StepReport, ExternalFault> {
        let calls_for_step = {
            let mut calls = self.calls.lock();
            calls.push(context.clone());
            calls.iter().filter(|c| c.step.id == context.step.id).count()
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let outcome = self.respond(context, calls_for_step).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn executor_name(&self) -> &str {
        "scripted_executor"
    }
}
