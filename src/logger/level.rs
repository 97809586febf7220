use std::fmt;
use std::str::FromStr;

use log::{Level, Record};
use serde::{Deserialize, Serialize};

use super::LoggerError;

/// Target that promotes an `error!` record to [`Severity::Critical`].
pub const CRITICAL_TARGET: &str = "critical";

/// Severity ordering shared by both sinks: DEBUG < INFO < WARNING < ERROR < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn of(record: &Record) -> Self {
        match record.level() {
            Level::Error if record.target() == CRITICAL_TARGET => Self::Critical,
            Level::Error => Self::Error,
            Level::Warn => Self::Warning,
            Level::Info => Self::Info,
            Level::Debug | Level::Trace => Self::Debug,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(LoggerError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, LoggerError> {
        s.parse()
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.name().to_string()
    }
}
