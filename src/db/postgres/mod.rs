mod api_keys;
mod completions;
mod embeddings;
mod logs;
mod models;
mod providers;

pub use api_keys::PostgresApiKeyRepo;
pub use completions::PostgresCompletionRepo;
pub use embeddings::PostgresEmbeddingRepo;
pub use logs::PostgresLogRepo;
pub use models::PostgresModelRepo;
pub use providers::PostgresProviderRepo;

use crate::db::error::{DbError, DbResult};

/// Parse an enum column stored as text
fn parse_text_enum<T>(value: &str, column: &str) -> DbResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| DbError::Internal(format!("Invalid {} in database: {}", column, e)))
}
