use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{ApiKey, CreateApiKey},
};

#[async_trait]
pub trait ApiKeyRepo: Send + Sync {
    async fn create(&self, input: CreateApiKey, key_hash: &str) -> DbResult<ApiKey>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<ApiKey>>;

    /// Look up a key by the hash of its credential.
    ///
    /// Revoked keys are returned too; callers check `revoked`.
    async fn find_by_hash(&self, key_hash: &str) -> DbResult<Option<ApiKey>>;

    async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<ApiKey>>;

    /// Mark a key revoked. Returns `false` if no such key exists.
    async fn revoke(&self, id: i64) -> DbResult<bool>;

    async fn count_active(&self) -> DbResult<i64>;
}
