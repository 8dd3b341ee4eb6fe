use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ApiKeyRepo,
    },
    models::{ApiKey, CreateApiKey, key_display_prefix},
};

const API_KEY_COLUMNS: &str = "id, key_prefix, comment, external_id, revoked, created_at, updated_at";

pub struct PostgresApiKeyRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresApiKeyRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_api_key(row: &sqlx::postgres::PgRow) -> ApiKey {
        ApiKey {
            id: row.get("id"),
            key_prefix: row.get("key_prefix"),
            comment: row.get("comment"),
            external_id: row.get("external_id"),
            revoked: row.get("revoked"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ApiKeyRepo for PostgresApiKeyRepo {
    async fn create(&self, input: CreateApiKey, key_hash: &str) -> DbResult<ApiKey> {
        let query = format!(
            r#"
            INSERT INTO api_keys (key_hash, key_prefix, comment, external_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            API_KEY_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(key_hash)
            .bind(key_display_prefix(key_hash))
            .bind(&input.comment)
            .bind(&input.external_id)
            .fetch_one(&self.write_pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    DbError::Conflict(match &input.external_id {
                        Some(external_id) => format!(
                            "API key with external id '{}' or this hash already exists",
                            external_id
                        ),
                        None => "API key with this hash already exists".to_string(),
                    })
                }
                _ => DbError::from(e),
            })?;

        Ok(Self::parse_api_key(&row))
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<ApiKey>> {
        let query = format!("SELECT {} FROM api_keys WHERE id = $1", API_KEY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.read_pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_api_key))
    }

    async fn find_by_hash(&self, key_hash: &str) -> DbResult<Option<ApiKey>> {
        // Served from the primary so a freshly revoked key is never seen as active.
        let query = format!("SELECT {} FROM api_keys WHERE key_hash = $1", API_KEY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(key_hash)
            .fetch_optional(&self.write_pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_api_key))
    }

    async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<ApiKey>> {
        let query = format!(
            "SELECT {} FROM api_keys WHERE external_id = $1",
            API_KEY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(external_id)
            .fetch_optional(&self.write_pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_api_key))
    }

    async fn revoke(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET revoked = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.write_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM api_keys WHERE revoked = FALSE")
            .fetch_one(&self.read_pool)
            .await?;

        Ok(row.get("count"))
    }
}
