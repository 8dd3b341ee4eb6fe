use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API key id recorded when the credential is absent, unknown, or revoked.
pub const UNKNOWN_API_KEY_ID: i64 = -1;

/// Token count recorded when the upstream did not report usage.
///
/// Stored as-is. Aggregations must skip it rather than read it as a count.
pub const TOKENS_NOT_REPORTED: i32 = -1;

/// Final state of a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Pending,
    Success,
    Error,
    /// Client went away before the upstream finished
    Aborted,
    /// Served from cache without an upstream call
    CacheHit,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Pending => "pending",
            CompletionStatus::Success => "success",
            CompletionStatus::Error => "error",
            CompletionStatus::Aborted => "aborted",
            CompletionStatus::CacheHit => "cache_hit",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CompletionStatus::Pending),
            "success" => Ok(CompletionStatus::Success),
            "error" => Ok(CompletionStatus::Error),
            "aborted" => Ok(CompletionStatus::Aborted),
            "cache_hit" => Ok(CompletionStatus::CacheHit),
            _ => Err(format!("Invalid completion status: {}", s)),
        }
    }
}

/// What the routing layer observed for one upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub model: String,
    #[serde(default)]
    pub upstream_id: Option<i64>,
    #[serde(default)]
    pub model_id: Option<i64>,
    /// Request payload as sent upstream
    pub prompt: serde_json::Value,
    /// Non-negative count, or [`TOKENS_NOT_REPORTED`]
    pub prompt_tokens: i32,
    /// Response payload (may be partial or null on failure)
    #[serde(default)]
    pub completion: serde_json::Value,
    /// Non-negative count, or [`TOKENS_NOT_REPORTED`]
    pub completion_tokens: i32,
    pub status: CompletionStatus,
    /// Time to first token in milliseconds
    pub ttft_ms: i64,
    /// Total duration in milliseconds
    pub duration_ms: i64,
}

/// Input to the completion store.
#[derive(Debug, Clone)]
pub struct NewCompletion {
    pub api_key_id: i64,
    pub outcome: CompletionOutcome,
}

impl NewCompletion {
    pub fn new(api_key_id: i64, outcome: CompletionOutcome) -> Self {
        Self {
            api_key_id,
            outcome,
        }
    }

    /// Token counts must be real counts or the not-reported sentinel, and
    /// timings must be non-negative.
    pub fn check_counts(&self) -> Result<(), String> {
        check_token_count("prompt_tokens", self.outcome.prompt_tokens)?;
        check_token_count("completion_tokens", self.outcome.completion_tokens)?;
        check_duration("ttft_ms", self.outcome.ttft_ms)?;
        check_duration("duration_ms", self.outcome.duration_ms)
    }
}

pub(crate) fn check_token_count(field: &str, value: i32) -> Result<(), String> {
    if value < TOKENS_NOT_REPORTED {
        return Err(format!(
            "{field} must be >= 0 or {TOKENS_NOT_REPORTED} (not reported), got {value}"
        ));
    }
    Ok(())
}

pub(crate) fn check_duration(field: &str, value: i64) -> Result<(), String> {
    if value < 0 {
        return Err(format!("{field} must be >= 0, got {value}"));
    }
    Ok(())
}

/// A persisted ledger row. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub id: i64,
    pub api_key_id: i64,
    pub upstream_id: Option<i64>,
    pub model_id: Option<i64>,
    pub model: String,
    pub prompt: serde_json::Value,
    pub prompt_tokens: i32,
    pub completion: serde_json::Value,
    pub completion_tokens: i32,
    pub status: CompletionStatus,
    pub ttft_ms: i64,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Completion {
    /// Prompt tokens, or `None` when the upstream did not report them.
    pub fn reported_prompt_tokens(&self) -> Option<u64> {
        u64::try_from(self.prompt_tokens).ok()
    }

    /// Completion tokens, or `None` when the upstream did not report them.
    pub fn reported_completion_tokens(&self) -> Option<u64> {
        u64::try_from(self.completion_tokens).ok()
    }

    pub fn has_known_api_key(&self) -> bool {
        self.api_key_id != UNKNOWN_API_KEY_ID
    }
}

/// Aggregated usage for one API key over a time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub api_key_id: i64,
    pub completions: i64,
    pub errors: i64,
    /// Sum over rows that reported prompt tokens
    pub prompt_tokens: i64,
    /// Sum over rows that reported completion tokens
    pub completion_tokens: i64,
    /// Rows whose prompt tokens were not reported
    pub unreported_prompt_tokens: i64,
    /// Rows whose completion tokens were not reported
    pub unreported_completion_tokens: i64,
}

impl UsageSummary {
    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}
