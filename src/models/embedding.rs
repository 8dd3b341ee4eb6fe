use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    CompletionStatus, UNKNOWN_API_KEY_ID,
    completion::{check_duration, check_token_count},
};

/// What the routing layer observed for one upstream embedding call.
///
/// Vectors are not kept; only the request and its accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOutcome {
    pub model: String,
    #[serde(default)]
    pub upstream_id: Option<i64>,
    #[serde(default)]
    pub model_id: Option<i64>,
    /// Request payload as sent upstream
    pub input: serde_json::Value,
    /// Non-negative count, or [`TOKENS_NOT_REPORTED`](super::TOKENS_NOT_REPORTED)
    pub input_tokens: i32,
    pub status: CompletionStatus,
    /// Total duration in milliseconds
    pub duration_ms: i64,
}

/// Input to the embedding store.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub api_key_id: i64,
    pub outcome: EmbeddingOutcome,
}

impl NewEmbedding {
    pub fn new(api_key_id: i64, outcome: EmbeddingOutcome) -> Self {
        Self {
            api_key_id,
            outcome,
        }
    }

    pub fn check_counts(&self) -> Result<(), String> {
        check_token_count("input_tokens", self.outcome.input_tokens)?;
        check_duration("duration_ms", self.outcome.duration_ms)
    }
}

/// A persisted embedding ledger row. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: i64,
    pub api_key_id: i64,
    pub upstream_id: Option<i64>,
    pub model_id: Option<i64>,
    pub model: String,
    pub input: serde_json::Value,
    pub input_tokens: i32,
    pub status: CompletionStatus,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Embedding {
    /// Input tokens, or `None` when the upstream did not report them.
    pub fn reported_input_tokens(&self) -> Option<u64> {
        u64::try_from(self.input_tokens).ok()
    }

    pub fn has_known_api_key(&self) -> bool {
        self.api_key_id != UNKNOWN_API_KEY_ID
    }
}

/// Aggregated embedding usage for one API key over a time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingUsage {
    pub embeddings: i64,
    pub errors: i64,
    /// Sum over rows that reported input tokens
    pub input_tokens: i64,
    /// Rows whose input tokens were not reported
    pub unreported_input_tokens: i64,
}
