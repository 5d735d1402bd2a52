//! # Metrics
//!
//! Scoring functions, the raw metric store and the OpenTelemetry instruments.

pub mod scoring;
pub mod store;
pub mod telemetry;

pub use scoring::{
    overall_score, performance_score, quality_score, security_score, success_rate,
    validation_pass_rate, ScoreSet,
};
pub use store::{MetricsStore, TestCounts};
