use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{DateRange, EmbeddingRepo, ListParams},
    },
    models::{Embedding, EmbeddingUsage, NewEmbedding},
};

const EMBEDDING_COLUMNS: &str =
    "id, api_key_id, upstream_id, model_id, model, input, input_tokens, status, duration_ms, created_at";

pub struct PostgresEmbeddingRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresEmbeddingRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_embedding(row: &sqlx::postgres::PgRow) -> DbResult<Embedding> {
        Ok(Embedding {
            id: row.get("id"),
            api_key_id: row.get("api_key_id"),
            upstream_id: row.get("upstream_id"),
            model_id: row.get("model_id"),
            model: row.get("model"),
            input: row.get("input"),
            input_tokens: row.get("input_tokens"),
            status: parse_text_enum(row.get("status"), "embedding status")?,
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl EmbeddingRepo for PostgresEmbeddingRepo {
    async fn create(&self, input: NewEmbedding) -> DbResult<Embedding> {
        input.check_counts().map_err(DbError::Validation)?;

        let outcome = &input.outcome;
        let query = format!(
            r#"
            INSERT INTO embeddings (
                api_key_id, upstream_id, model_id, model, input, input_tokens,
                status, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            EMBEDDING_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(input.api_key_id)
            .bind(outcome.upstream_id)
            .bind(outcome.model_id)
            .bind(&outcome.model)
            .bind(&outcome.input)
            .bind(outcome.input_tokens)
            .bind(outcome.status.as_str())
            .bind(outcome.duration_ms)
            .fetch_one(&self.write_pool)
            .await?;

        Self::parse_embedding(&row)
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Embedding>> {
        let query = format!("SELECT {} FROM embeddings WHERE id = $1", EMBEDDING_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.read_pool)
            .await?;

        row.as_ref().map(Self::parse_embedding).transpose()
    }

    async fn list_by_api_key(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Embedding>> {
        let query = format!(
            "SELECT {} FROM embeddings WHERE api_key_id = $1 ORDER BY id {} LIMIT $2",
            EMBEDDING_COLUMNS,
            params.sort_order.as_sql()
        );
        let rows = sqlx::query(&query)
            .bind(api_key_id)
            .bind(params.limit())
            .fetch_all(&self.read_pool)
            .await?;

        rows.iter().map(Self::parse_embedding).collect()
    }

    async fn usage_by_api_key(
        &self,
        api_key_id: i64,
        range: DateRange,
    ) -> DbResult<EmbeddingUsage> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS embeddings,
                COUNT(*) FILTER (WHERE status = 'error') AS errors,
                COALESCE(SUM(input_tokens) FILTER (WHERE input_tokens >= 0), 0)::BIGINT AS input_tokens,
                COUNT(*) FILTER (WHERE input_tokens = -1) AS unreported_input_tokens
            FROM embeddings
            WHERE api_key_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(api_key_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.read_pool)
        .await?;

        Ok(EmbeddingUsage {
            embeddings: row.get("embeddings"),
            errors: row.get("errors"),
            input_tokens: row.get("input_tokens"),
            unreported_input_tokens: row.get("unreported_input_tokens"),
        })
    }
}
