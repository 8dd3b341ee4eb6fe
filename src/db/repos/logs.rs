use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{LogEntry, NewLogEntry},
};

#[async_trait]
pub trait LogRepo: Send + Sync {
    async fn create(&self, input: NewLogEntry) -> DbResult<LogEntry>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<LogEntry>>;
    async fn list_by_completion(&self, completion_id: i64) -> DbResult<Vec<LogEntry>>;
}
