//! # Orchestration Engine
//!
//! Runs campaign sessions against a [`StepExecutor`].
//!
//! ## Core Components
//!
//! - **SessionCoordinator**: actor owning one session; the single point where
//!   workers report step outcomes, errors and warnings
//! - **SessionHandle**: cloneable command sender plus snapshot reader
//! - **ScenarioWorker**: owns one execution and its step results
//! - **Orchestrator**: drives the pipeline phases, bounded parallelism and
//!   deadlines
//! - **SessionRegistry**: running sessions by id
//!
//! ## Usage
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use campaign_core::config::CampaignConfig;
//! use campaign_core::ids::UuidIdGenerator;
//! use campaign_core::orchestration::{
//!     ExternalFault, Orchestrator, ScenarioDefinition, StepContext, StepDefinition,
//!     StepExecutor, StepReport,
//! };
//! use std::sync::Arc;
//!
//! struct AlwaysPasses;
//!
//! #[async_trait]
//! impl StepExecutor for AlwaysPasses {
//!     async fn execute_step(&self, _context: &StepContext) -> Result<StepReport, ExternalFault> {
//!         Ok(StepReport::passed())
//!     }
//! }
//!
//! # async fn example() -> campaign_core::Result<()> {
//! let orchestrator = Orchestrator::new(
//!     CampaignConfig::default(),
//!     Arc::new(UuidIdGenerator),
//!     Arc::new(AlwaysPasses),
//! );
//! let session = orchestrator.new_session("nightly", "ci");
//! let scenario = ScenarioDefinition::new("login", "Login flow")
//!     .with_step(StepDefinition::new("submit", "Submit credentials"));
//!
//! let report = orchestrator.run_session(session, vec![scenario]).await?;
//! println!("{}", report.status());
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod orchestrator;
pub mod registry;
pub mod types;
mod worker;

pub use coordinator::{
    CommandResponder, CoordinatorError, CoordinatorResult, SessionCommand, SessionCoordinator,
    SessionHandle, DEFAULT_COMMAND_BUFFER,
};
pub use orchestrator::Orchestrator;
pub use registry::SessionRegistry;
pub use types::{
    AssertionDefinition, AssertionOutcome, ExternalFault, ScenarioDefinition, ScenarioRun,
    SessionReport, StepContext, StepDefinition, StepExecutor, StepReport,
};
