use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::{parse_json_text, parse_text_enum};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{DateRange, EmbeddingRepo, ListParams},
    },
    models::{Embedding, EmbeddingUsage, NewEmbedding},
};

const EMBEDDING_COLUMNS: &str =
    "id, api_key_id, upstream_id, model_id, model, input, input_tokens, status, duration_ms, created_at";

pub struct SqliteEmbeddingRepo {
    pool: SqlitePool,
}

impl SqliteEmbeddingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_embedding(row: &sqlx::sqlite::SqliteRow) -> DbResult<Embedding> {
        Ok(Embedding {
            id: row.get("id"),
            api_key_id: row.get("api_key_id"),
            upstream_id: row.get("upstream_id"),
            model_id: row.get("model_id"),
            model: row.get("model"),
            input: parse_json_text(row.get("input"))?,
            input_tokens: row.get("input_tokens"),
            status: parse_text_enum(row.get("status"), "embedding status")?,
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl EmbeddingRepo for SqliteEmbeddingRepo {
    async fn create(&self, input: NewEmbedding) -> DbResult<Embedding> {
        input.check_counts().map_err(DbError::Validation)?;

        let now = chrono::Utc::now();
        let outcome = input.outcome;
        let payload = serde_json::to_string(&outcome.input)?;

        let result = sqlx::query(
            r#"
            INSERT INTO embeddings (
                api_key_id, upstream_id, model_id, model, input, input_tokens,
                status, duration_ms, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.api_key_id)
        .bind(outcome.upstream_id)
        .bind(outcome.model_id)
        .bind(&outcome.model)
        .bind(payload)
        .bind(outcome.input_tokens)
        .bind(outcome.status.as_str())
        .bind(outcome.duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Embedding {
            id: result.last_insert_rowid(),
            api_key_id: input.api_key_id,
            upstream_id: outcome.upstream_id,
            model_id: outcome.model_id,
            model: outcome.model,
            input: outcome.input,
            input_tokens: outcome.input_tokens,
            status: outcome.status,
            duration_ms: outcome.duration_ms,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Embedding>> {
        let query = format!("SELECT {} FROM embeddings WHERE id = ?", EMBEDDING_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_embedding).transpose()
    }

    async fn list_by_api_key(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Embedding>> {
        let query = format!(
            "SELECT {} FROM embeddings WHERE api_key_id = ? ORDER BY id {} LIMIT ?",
            EMBEDDING_COLUMNS,
            params.sort_order.as_sql()
        );
        let rows = sqlx::query(&query)
            .bind(api_key_id)
            .bind(params.limit())
            .fetch_all(&self.pool)
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
                COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0) AS errors,
                COALESCE(SUM(CASE WHEN input_tokens >= 0 THEN input_tokens ELSE 0 END), 0) AS input_tokens,
                COALESCE(SUM(CASE WHEN input_tokens = -1 THEN 1 ELSE 0 END), 0) AS unreported_input_tokens
            FROM embeddings
            WHERE api_key_id = ? AND created_at >= ? AND created_at < ?
            "#,
        )
        .bind(api_key_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(EmbeddingUsage {
            embeddings: row.get("embeddings"),
            errors: row.get("errors"),
            input_tokens: row.get("input_tokens"),
            unreported_input_tokens: row.get("unreported_input_tokens"),
        })
    }
}
