use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{ListParams, ProviderRepo},
    },
    models::{CreateProvider, Provider},
};

pub struct SqliteProviderRepo {
    pool: SqlitePool,
}

impl SqliteProviderRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_provider(row: &sqlx::sqlite::SqliteRow) -> DbResult<Provider> {
        Ok(Provider {
            id: row.get("id"),
            name: row.get("name"),
            kind: parse_text_enum(row.get("kind"), "provider kind")?,
            base_url: row.get("base_url"),
            api_key: row.get("api_key"),
            api_version: row.get("api_version"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ProviderRepo for SqliteProviderRepo {
    async fn create(&self, input: CreateProvider) -> DbResult<Provider> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO providers (name, kind, base_url, api_key, api_version, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.name)
        .bind(input.kind.as_str())
        .bind(&input.base_url)
        .bind(&input.api_key)
        .bind(&input.api_version)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("Provider '{}' already exists", input.name))
            }
            _ => DbError::from(e),
        })?;

        Ok(Provider {
            id: result.last_insert_rowid(),
            name: input.name,
            kind: input.kind,
            base_url: input.base_url,
            api_key: input.api_key,
            api_version: input.api_version,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Provider>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, kind, base_url, api_key, api_version, created_at
            FROM providers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_provider).transpose()
    }

    async fn list(&self, params: ListParams) -> DbResult<Vec<Provider>> {
        let query = format!(
            r#"
            SELECT id, name, kind, base_url, api_key, api_version, created_at
            FROM providers
            ORDER BY id {}
            LIMIT ?
            "#,
            params.sort_order.as_sql()
        );

        let rows = sqlx::query(&query)
            .bind(params.limit())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::parse_provider).collect()
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM providers")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }
}
