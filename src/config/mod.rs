//! # Campaign Configuration
//!
//! Layered configuration for the campaign core:
//!
//! 1. `config/campaign/base.toml`
//! 2. `config/campaign/<environment>.toml` (optional)
//! 3. `CAMPAIGN__SECTION__KEY` environment variables
//!
//! The environment comes from `CAMPAIGN_ENV` and defaults to `development`.
//! Every section has defaults, so each layer only needs the values it changes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use campaign_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let step_timeout = manager.config().step_timeout();
//! let parallel = manager.config().execution.parallel_execution;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::DEFAULT_MAX_RETRIES;
use crate::models::SeverityLevel;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub session: SessionConfig,
    pub step: StepConfig,
    pub execution: ExecutionConfig,
    pub ledger: LedgerConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_retries: u32,
    /// Deadline for the whole execution phase of a session
    pub timeout_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub max_retries: u32,
    /// Deadline for a single step call
    pub timeout_seconds: u64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Default for sessions that do not choose for themselves
    pub parallel_execution: bool,
    pub max_concurrent_executions: usize,
    pub max_retries: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel_execution: false,
            max_concurrent_executions: 4,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Capacity of the lifecycle event channel
    pub alert_channel_capacity: usize,
    /// Entries at or above this severity raise an alert when recorded
    pub auto_alert_severity: SeverityLevel,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            alert_channel_capacity: 1000,
            auto_alert_severity: SeverityLevel::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: String,
    /// `pretty` or `json`
    pub log_format: String,
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "campaign-core".to_string(),
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
        }
    }
}

const LOG_FORMATS: &[&str] = &["pretty", "json"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl CampaignConfig {
    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.session.timeout_minutes == 0 {
            return Err(ConfigurationError::invalid_value(
                "session.timeout_minutes",
                self.session.timeout_minutes,
                "must be greater than 0",
            ));
        }

        if self.step.timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "step.timeout_seconds",
                self.step.timeout_seconds,
                "must be greater than 0",
            ));
        }

        if self.step.timeout_seconds > self.session.timeout_minutes * 60 {
            return Err(ConfigurationError::invalid_value(
                "step.timeout_seconds",
                self.step.timeout_seconds,
                "must not exceed the session timeout",
            ));
        }

        if self.execution.max_concurrent_executions == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_executions",
                self.execution.max_concurrent_executions,
                "must be greater than 0",
            ));
        }

        if self.execution.max_concurrent_executions > 256 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_executions",
                self.execution.max_concurrent_executions,
                "must be at most 256",
            ));
        }

        if self.ledger.alert_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "ledger.alert_channel_capacity",
                self.ledger.alert_channel_capacity,
                "must be greater than 0",
            ));
        }

        if !LOG_FORMATS.contains(&self.telemetry.log_format.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "telemetry.log_format",
                &self.telemetry.log_format,
                format!("must be one of {LOG_FORMATS:?}"),
            ));
        }

        if !LOG_LEVELS.contains(&self.telemetry.log_level.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "telemetry.log_level",
                &self.telemetry.log_level,
                format!("must be one of {LOG_LEVELS:?}"),
            ));
        }

        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step.timeout_seconds)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CampaignConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_timeout(), Duration::from_secs(300));
        assert_eq!(config.session_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let mut config = CampaignConfig::default();
        config.execution.max_concurrent_executions = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. })
                if field == "execution.max_concurrent_executions"
        ));

        let mut config = CampaignConfig::default();
        config.step.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_timeout_must_fit_in_session() {
        let mut config = CampaignConfig::default();
        config.session.timeout_minutes = 1;
        config.step.timeout_seconds = 61;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let mut config = CampaignConfig::default();
        config.telemetry.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
