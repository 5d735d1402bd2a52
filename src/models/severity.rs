//! Severity and log level scales shared by every entity in the hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered severity summary. `Info < Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    /// Raise to `floor` if currently below it. Never lowers.
    pub fn escalate_to(&mut self, floor: SeverityLevel) {
        if *self < floor {
            *self = floor;
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity level: {s}")),
        }
    }
}

/// Log level attached to a ledger entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Critical,
}

impl LogLevel {
    /// Severity implied by this log level
    pub fn severity(&self) -> SeverityLevel {
        match self {
            Self::Trace | Self::Debug | Self::Info => SeverityLevel::Info,
            Self::Warn => SeverityLevel::Low,
            Self::Error => SeverityLevel::Medium,
            Self::Fatal => SeverityLevel::High,
            Self::Critical => SeverityLevel::Critical,
        }
    }

    /// Entries at this level block a session from being reported as plain FAILED
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal | Self::Critical)
    }

    /// Closest `tracing` level for emitting the entry
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error | Self::Fatal | Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(SeverityLevel::Info < SeverityLevel::Low);
        assert!(SeverityLevel::Low < SeverityLevel::Medium);
        assert!(SeverityLevel::Medium < SeverityLevel::High);
        assert!(SeverityLevel::High < SeverityLevel::Critical);
    }

    #[test]
    fn test_escalate_never_lowers() {
        let mut severity = SeverityLevel::Critical;
        severity.escalate_to(SeverityLevel::High);
        assert_eq!(severity, SeverityLevel::Critical);

        let mut severity = SeverityLevel::Info;
        severity.escalate_to(SeverityLevel::High);
        assert_eq!(severity, SeverityLevel::High);
    }

    #[test]
    fn test_log_level_severity_mapping() {
        assert_eq!(LogLevel::Trace.severity(), SeverityLevel::Info);
        assert_eq!(LogLevel::Debug.severity(), SeverityLevel::Info);
        assert_eq!(LogLevel::Info.severity(), SeverityLevel::Info);
        assert_eq!(LogLevel::Warn.severity(), SeverityLevel::Low);
        assert_eq!(LogLevel::Error.severity(), SeverityLevel::Medium);
        assert_eq!(LogLevel::Fatal.severity(), SeverityLevel::High);
        assert_eq!(LogLevel::Critical.severity(), SeverityLevel::Critical);
    }

    #[test]
    fn test_parse_round_trip() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("High".parse::<SeverityLevel>().unwrap(), SeverityLevel::High);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
