use async_trait::async_trait;

use super::{DateRange, ListParams};
use crate::{
    db::error::DbResult,
    models::{Embedding, EmbeddingUsage, NewEmbedding},
};

/// Append-only embedding ledger.
#[async_trait]
pub trait EmbeddingRepo: Send + Sync {
    /// Insert one ledger row and return it with its generated id.
    ///
    /// Rejects token counts below the not-reported sentinel and negative
    /// durations with `DbError::Validation`.
    async fn create(&self, input: NewEmbedding) -> DbResult<Embedding>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Embedding>>;
    async fn list_by_api_key(&self, api_key_id: i64, params: ListParams)
    -> DbResult<Vec<Embedding>>;

    /// Aggregate usage for a key, skipping unreported token counts.
    async fn usage_by_api_key(&self, api_key_id: i64, range: DateRange)
    -> DbResult<EmbeddingUsage>;
}
