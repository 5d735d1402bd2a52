use std::sync::Arc;
use std::time::Duration;

use campaign_core::config::CampaignConfig;
use campaign_core::ids::SequentialIdGenerator;
use campaign_core::orchestration::{Orchestrator, ScenarioDefinition, StepDefinition, StepExecutor};

/// Scenario `id` with steps `step-1..=step_count`
pub fn scenario(id: &str, step_count: usize) -> ScenarioDefinition {
    (1..=step_count).fold(ScenarioDefinition::new(id, format!("Scenario {id}")), |scenario, n| {
        scenario.with_step(StepDefinition::new(format!("step-{n}"), format!("Step {n}")))
    })
}

/// Scenario with explicitly named steps
pub fn scenario_with_steps(id: &str, step_ids: &[&str]) -> ScenarioDefinition {
    step_ids
        .iter()
        .fold(ScenarioDefinition::new(id, format!("Scenario {id}")), |scenario, step_id| {
            scenario.with_step(StepDefinition::new(*step_id, format!("Step {step_id}")))
        })
}

pub fn sequential_config() -> CampaignConfig {
    let mut config = CampaignConfig::default();
    config.execution.parallel_execution = false;
    config
}

pub fn parallel_config(max_concurrent: usize) -> CampaignConfig {
    let mut config = CampaignConfig::default();
    config.execution.parallel_execution = true;
    config.execution.max_concurrent_executions = max_concurrent;
    config
}

/// Orchestrator with sequential ids and the given executor
pub fn orchestrator_with(config: CampaignConfig, executor: Arc<dyn StepExecutor>) -> Orchestrator {
    Orchestrator::new(config, Arc::new(SequentialIdGenerator::new()), executor)
}

/// Orchestrator whose step and session deadlines are short enough for tests
pub fn orchestrator_with_deadlines(
    config: CampaignConfig,
    executor: Arc<dyn StepExecutor>,
    step_timeout: Duration,
    session_timeout: Duration,
) -> Orchestrator {
    orchestrator_with(config, executor).with_timeouts(step_timeout, session_timeout)
}
