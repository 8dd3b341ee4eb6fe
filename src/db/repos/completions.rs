use async_trait::async_trait;

use super::{DateRange, ListParams};
use crate::{
    db::error::DbResult,
    models::{Completion, NewCompletion, UsageSummary},
};

/// Append-only completion ledger.
#[async_trait]
pub trait CompletionRepo: Send + Sync {
    /// Insert one ledger row and return it with its generated id.
    ///
    /// Rejects token counts below the not-reported sentinel and negative
    /// timings with `DbError::Validation`.
    async fn create(&self, input: NewCompletion) -> DbResult<Completion>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Completion>>;
    async fn list_by_api_key(&self, api_key_id: i64, params: ListParams)
    -> DbResult<Vec<Completion>>;

    /// Aggregate usage for a key. Unreported token counts are counted
    /// separately and never summed.
    async fn usage_by_api_key(&self, api_key_id: i64, range: DateRange)
    -> DbResult<UsageSummary>;
}
