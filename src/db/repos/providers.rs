use async_trait::async_trait;

use super::ListParams;
use crate::{
    db::error::DbResult,
    models::{CreateProvider, Provider},
};

#[async_trait]
pub trait ProviderRepo: Send + Sync {
    async fn create(&self, input: CreateProvider) -> DbResult<Provider>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Provider>>;
    async fn list(&self, params: ListParams) -> DbResult<Vec<Provider>>;
    async fn count(&self) -> DbResult<i64>;
}
