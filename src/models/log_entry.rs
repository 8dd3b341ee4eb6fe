use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warn => "warn",
            LogSeverity::Error => "error",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warn" => Ok(LogSeverity::Warn),
            "error" => Ok(LogSeverity::Error),
            _ => Err(format!("Invalid log severity: {}", s)),
        }
    }
}

/// Structured payload attached to a log entry, keyed by `type`.
///
/// Stored as JSON with the tag, so rows written before a new variant exists
/// keep deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum LogDetails {
    CompletionError(CompletionErrorDetails),
}

/// Why an upstream completion failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionErrorDetails {
    /// Error kind, e.g. `timeout` or `upstream_status`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// HTTP status returned upstream, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Diagnostic context a caller hands to the recorder alongside an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticInput {
    pub level: LogSeverity,
    pub message: String,
    #[serde(default)]
    pub details: Option<LogDetails>,
}

/// A log entry ready to be written, carrying its correlation ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub level: LogSeverity,
    pub message: String,
    pub details: Option<LogDetails>,
    pub related_api_key_id: i64,
    pub related_upstream_id: Option<i64>,
    pub related_completion_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub level: LogSeverity,
    pub message: String,
    pub details: Option<LogDetails>,
    pub related_api_key_id: i64,
    pub related_upstream_id: Option<i64>,
    pub related_completion_id: i64,
    pub created_at: DateTime<Utc>,
}
