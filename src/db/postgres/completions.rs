use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{CompletionRepo, DateRange, ListParams},
    },
    models::{Completion, NewCompletion, UsageSummary},
};

const COMPLETION_COLUMNS: &str = "id, api_key_id, upstream_id, model_id, model, prompt, prompt_tokens, \
     completion, completion_tokens, status, ttft_ms, duration_ms, created_at";

pub struct PostgresCompletionRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresCompletionRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_completion(row: &sqlx::postgres::PgRow) -> DbResult<Completion> {
        Ok(Completion {
            id: row.get("id"),
            api_key_id: row.get("api_key_id"),
            upstream_id: row.get("upstream_id"),
            model_id: row.get("model_id"),
            model: row.get("model"),
            prompt: row.get("prompt"),
            prompt_tokens: row.get("prompt_tokens"),
            completion: row.get("completion"),
            completion_tokens: row.get("completion_tokens"),
            status: parse_text_enum(row.get("status"), "completion status")?,
            ttft_ms: row.get("ttft_ms"),
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl CompletionRepo for PostgresCompletionRepo {
    async fn create(&self, input: NewCompletion) -> DbResult<Completion> {
        input.check_counts().map_err(DbError::Validation)?;

        let outcome = &input.outcome;
        let query = format!(
            r#"
            INSERT INTO completions (
                api_key_id, upstream_id, model_id, model, prompt, prompt_tokens,
                completion, completion_tokens, status, ttft_ms, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            COMPLETION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(input.api_key_id)
            .bind(outcome.upstream_id)
            .bind(outcome.model_id)
            .bind(&outcome.model)
            .bind(&outcome.prompt)
            .bind(outcome.prompt_tokens)
            .bind(&outcome.completion)
            .bind(outcome.completion_tokens)
            .bind(outcome.status.as_str())
            .bind(outcome.ttft_ms)
            .bind(outcome.duration_ms)
            .fetch_one(&self.write_pool)
            .await?;

        Self::parse_completion(&row)
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Completion>> {
        let query = format!("SELECT {} FROM completions WHERE id = $1", COMPLETION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.read_pool)
            .await?;

        row.as_ref().map(Self::parse_completion).transpose()
    }

    async fn list_by_api_key(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Completion>> {
        let query = format!(
            "SELECT {} FROM completions WHERE api_key_id = $1 ORDER BY id {} LIMIT $2",
            COMPLETION_COLUMNS,
            params.sort_order.as_sql()
        );
        let rows = sqlx::query(&query)
            .bind(api_key_id)
            .bind(params.limit())
            .fetch_all(&self.read_pool)
            .await?;

        rows.iter().map(Self::parse_completion).collect()
    }

    async fn usage_by_api_key(
        &self,
        api_key_id: i64,
        range: DateRange,
    ) -> DbResult<UsageSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS completions,
                COUNT(*) FILTER (WHERE status = 'error') AS errors,
                COALESCE(SUM(prompt_tokens) FILTER (WHERE prompt_tokens >= 0), 0)::BIGINT AS prompt_tokens,
                COALESCE(SUM(completion_tokens) FILTER (WHERE completion_tokens >= 0), 0)::BIGINT AS completion_tokens,
                COUNT(*) FILTER (WHERE prompt_tokens = -1) AS unreported_prompt_tokens,
                COUNT(*) FILTER (WHERE completion_tokens = -1) AS unreported_completion_tokens
            FROM completions
            WHERE api_key_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(api_key_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.read_pool)
        .await?;

        Ok(UsageSummary {
            api_key_id,
            completions: row.get("completions"),
            errors: row.get("errors"),
            prompt_tokens: row.get("prompt_tokens"),
            completion_tokens: row.get("completion_tokens"),
            unreported_prompt_tokens: row.get("unreported_prompt_tokens"),
            unreported_completion_tokens: row.get("unreported_completion_tokens"),
        })
    }
}
