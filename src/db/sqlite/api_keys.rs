use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ApiKeyRepo,
    },
    models::{ApiKey, CreateApiKey, key_display_prefix},
};

const API_KEY_COLUMNS: &str = "id, key_prefix, comment, external_id, revoked, created_at, updated_at";

pub struct SqliteApiKeyRepo {
    pool: SqlitePool,
}

impl SqliteApiKeyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_api_key(row: &sqlx::sqlite::SqliteRow) -> ApiKey {
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

    async fn fetch_one_where(&self, column: &str, value: &str) -> DbResult<Option<ApiKey>> {
        let query = format!(
            "SELECT {} FROM api_keys WHERE {} = ?",
            API_KEY_COLUMNS, column
        );
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_api_key))
    }
}

#[async_trait]
impl ApiKeyRepo for SqliteApiKeyRepo {
    async fn create(&self, input: CreateApiKey, key_hash: &str) -> DbResult<ApiKey> {
        let now = chrono::Utc::now();
        let key_prefix = key_display_prefix(key_hash);

        let result = sqlx::query(
            r#"
            INSERT INTO api_keys (key_hash, key_prefix, comment, external_id, revoked, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(key_hash)
        .bind(key_prefix)
        .bind(&input.comment)
        .bind(&input.external_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
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

        Ok(ApiKey {
            id: result.last_insert_rowid(),
            key_prefix: key_prefix.to_string(),
            comment: input.comment,
            external_id: input.external_id,
            revoked: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<ApiKey>> {
        let query = format!("SELECT {} FROM api_keys WHERE id = ?", API_KEY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_api_key))
    }

    async fn find_by_hash(&self, key_hash: &str) -> DbResult<Option<ApiKey>> {
        self.fetch_one_where("key_hash", key_hash).await
    }

    async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<ApiKey>> {
        self.fetch_one_where("external_id", external_id).await
    }

    async fn revoke(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET revoked = 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM api_keys WHERE revoked = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }
}
