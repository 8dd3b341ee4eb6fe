use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{ListParams, ProviderRepo},
    },
    models::{CreateProvider, Provider},
};

pub struct PostgresProviderRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresProviderRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_provider(row: &sqlx::postgres::PgRow) -> DbResult<Provider> {
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
impl ProviderRepo for PostgresProviderRepo {
    async fn create(&self, input: CreateProvider) -> DbResult<Provider> {
        let row = sqlx::query(
            r#"
            INSERT INTO providers (name, kind, base_url, api_key, api_version)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, kind, base_url, api_key, api_version, created_at
            "#,
        )
        .bind(&input.name)
        .bind(input.kind.as_str())
        .bind(&input.base_url)
        .bind(&input.api_key)
        .bind(&input.api_version)
        .fetch_one(&self.write_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("Provider '{}' already exists", input.name))
            }
            _ => DbError::from(e),
        })?;

        Self::parse_provider(&row)
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Provider>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, kind, base_url, api_key, api_version, created_at
            FROM providers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        row.as_ref().map(Self::parse_provider).transpose()
    }

    async fn list(&self, params: ListParams) -> DbResult<Vec<Provider>> {
        let query = format!(
            r#"
            SELECT id, name, kind, base_url, api_key, api_version, created_at
            FROM providers
            ORDER BY id {}
            LIMIT $1
            "#,
            params.sort_order.as_sql()
        );

        let rows = sqlx::query(&query)
            .bind(params.limit())
            .fetch_all(&self.read_pool)
            .await?;

        rows.iter().map(Self::parse_provider).collect()
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM providers")
            .fetch_one(&self.read_pool)
            .await?;

        Ok(row.get("count"))
    }
}
