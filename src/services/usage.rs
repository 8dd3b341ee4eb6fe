use std::sync::Arc;

use super::{KeyLookup, KeyResolver, ServiceError, ServiceResult};
use crate::{
    db::{DateRange, DbPool, DbResult, ListParams},
    models::{Completion, Embedding, EmbeddingUsage, LogEntry, UsageSummary},
};

/// Read side of the completion ledger
#[derive(Clone)]
pub struct UsageService {
    db: Arc<DbPool>,
    resolver: KeyResolver,
}

impl UsageService {
    pub fn new(db: Arc<DbPool>) -> Self {
        let resolver = KeyResolver::new(db.api_keys());
        Self { db, resolver }
    }

    /// Get usage summary for an API key within a date range
    pub async fn get_summary(&self, api_key_id: i64, range: DateRange) -> DbResult<UsageSummary> {
        self.db.completions().usage_by_api_key(api_key_id, range).await
    }

    /// Embedding usage for an API key within a date range
    pub async fn get_embedding_usage(
        &self,
        api_key_id: i64,
        range: DateRange,
    ) -> DbResult<EmbeddingUsage> {
        self.db.embeddings().usage_by_api_key(api_key_id, range).await
    }

    /// Usage for the key a raw credential belongs to.
    ///
    /// Revoked keys still report the usage recorded while they were active.
    pub async fn get_summary_by_credential(
        &self,
        credential: &str,
        range: DateRange,
    ) -> ServiceResult<UsageSummary> {
        let api_key_id = self.key_id_for(credential).await?;
        Ok(self.get_summary(api_key_id, range).await?)
    }

    /// Embedding usage for the key a raw credential belongs to.
    pub async fn get_embedding_usage_by_credential(
        &self,
        credential: &str,
        range: DateRange,
    ) -> ServiceResult<EmbeddingUsage> {
        let api_key_id = self.key_id_for(credential).await?;
        Ok(self.get_embedding_usage(api_key_id, range).await?)
    }

    async fn key_id_for(&self, credential: &str) -> ServiceResult<i64> {
        match self.resolver.lookup(credential).await? {
            KeyLookup::Active(id) | KeyLookup::Revoked(id) => Ok(id),
            KeyLookup::Unknown => Err(ServiceError::NotFound("API key".to_string())),
        }
    }

    /// Most recent completions recorded for an API key
    pub async fn list_completions(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Completion>> {
        self.db.completions().list_by_api_key(api_key_id, params).await
    }

    /// Most recent embeddings recorded for an API key
    pub async fn list_embeddings(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Embedding>> {
        self.db.embeddings().list_by_api_key(api_key_id, params).await
    }

    /// Diagnostic log entries attached to a completion
    pub async fn list_logs(&self, completion_id: i64) -> DbResult<Vec<LogEntry>> {
        self.db.logs().list_by_completion(completion_id).await
    }
}
