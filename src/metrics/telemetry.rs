//! # Campaign Telemetry
//!
//! OpenTelemetry instruments for the campaign lifecycle:
//! - Session completions by terminal status
//! - Step results by status
//! - Ledger faults by log level
//! - Session duration histogram
//!
//! With no meter provider installed the instruments are no-ops.
//!
//! ## Usage
//!
//! ```rust
//! use campaign_core::metrics::telemetry::*;
//! use opentelemetry::KeyValue;
//!
//! sessions_completed_total().add(1, &[KeyValue::new("status", "completed")]);
//! session_duration().record(1250.0, &[]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

use crate::models::LogLevel;
use crate::state_machine::{ExecutionState, SessionState};

/// Lazy-initialized meter for campaign metrics
static CAMPAIGN_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    CAMPAIGN_METER.get_or_init(|| opentelemetry::global::meter("campaign-core"))
}

// Counters

/// Total number of sessions that reached a terminal status
///
/// Labels:
/// - status: completed, failed, error, cancelled, timeout
pub fn sessions_completed_total() -> Counter<u64> {
    meter()
        .u64_counter("campaign.sessions.completed.total")
        .with_description("Total number of sessions that reached a terminal status")
        .build()
}

/// Total number of step results recorded
///
/// Labels:
/// - status: passed, failed, error, timeout, skipped, cancelled
pub fn step_results_total() -> Counter<u64> {
    meter()
        .u64_counter("campaign.steps.results.total")
        .with_description("Total number of step results recorded")
        .build()
}

/// Total number of faults written to the error ledger
///
/// Labels:
/// - log_level: trace .. critical
pub fn faults_recorded_total() -> Counter<u64> {
    meter()
        .u64_counter("campaign.ledger.faults.total")
        .with_description("Total number of faults written to the error ledger")
        .build()
}

// Histograms

/// Session duration in milliseconds, from start to terminal status
pub fn session_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("campaign.sessions.duration")
        .with_description("Session duration from start to terminal status")
        .with_unit("ms")
        .build()
}

// Recording helpers

pub fn record_session_completed(status: SessionState, duration_ms: Option<i64>) {
    let labels = [KeyValue::new("status", status.to_string())];
    sessions_completed_total().add(1, &labels);
    if let Some(duration_ms) = duration_ms {
        session_duration().record(duration_ms as f64, &labels);
    }
}

pub fn record_step_result(status: ExecutionState) {
    step_results_total().add(1, &[KeyValue::new("status", status.to_string())]);
}

pub fn record_fault(level: LogLevel) {
    faults_recorded_total().add(1, &[KeyValue::new("log_level", level.to_string())]);
}
