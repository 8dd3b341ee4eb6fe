use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreateModel, Model, ModelCounts},
};

#[async_trait]
pub trait ModelRepo: Send + Sync {
    /// Fails with `DbError::Validation` when the provider does not exist and
    /// `DbError::Conflict` when the provider already serves a model of that name.
    async fn create(&self, input: CreateModel) -> DbResult<Model>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Model>>;
    async fn list_by_provider(&self, provider_id: i64) -> DbResult<Vec<Model>>;
    async fn count_by_type(&self) -> DbResult<ModelCounts>;
}
