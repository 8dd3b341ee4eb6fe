use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::{parse_json_text, parse_text_enum};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{CompletionRepo, DateRange, ListParams},
    },
    models::{Completion, NewCompletion, UsageSummary},
};

const COMPLETION_COLUMNS: &str = "id, api_key_id, upstream_id, model_id, model, prompt, prompt_tokens, \
     completion, completion_tokens, status, ttft_ms, duration_ms, created_at";

pub struct SqliteCompletionRepo {
    pool: SqlitePool,
}

impl SqliteCompletionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_completion(row: &sqlx::sqlite::SqliteRow) -> DbResult<Completion> {
        Ok(Completion {
            id: row.get("id"),
            api_key_id: row.get("api_key_id"),
            upstream_id: row.get("upstream_id"),
            model_id: row.get("model_id"),
            model: row.get("model"),
            prompt: parse_json_text(row.get("prompt"))?,
            prompt_tokens: row.get("prompt_tokens"),
            completion: parse_json_text(row.get("completion"))?,
            completion_tokens: row.get("completion_tokens"),
            status: parse_text_enum(row.get("status"), "completion status")?,
            ttft_ms: row.get("ttft_ms"),
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl CompletionRepo for SqliteCompletionRepo {
    async fn create(&self, input: NewCompletion) -> DbResult<Completion> {
        input.check_counts().map_err(DbError::Validation)?;

        let now = chrono::Utc::now();
        let outcome = input.outcome;
        let prompt = serde_json::to_string(&outcome.prompt)?;
        let completion = serde_json::to_string(&outcome.completion)?;

        let result = sqlx::query(
            r#"
            INSERT INTO completions (
                api_key_id, upstream_id, model_id, model, prompt, prompt_tokens,
                completion, completion_tokens, status, ttft_ms, duration_ms, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.api_key_id)
        .bind(outcome.upstream_id)
        .bind(outcome.model_id)
        .bind(&outcome.model)
        .bind(prompt)
        .bind(outcome.prompt_tokens)
        .bind(completion)
        .bind(outcome.completion_tokens)
        .bind(outcome.status.as_str())
        .bind(outcome.ttft_ms)
        .bind(outcome.duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Completion {
            id: result.last_insert_rowid(),
            api_key_id: input.api_key_id,
            upstream_id: outcome.upstream_id,
            model_id: outcome.model_id,
            model: outcome.model,
            prompt: outcome.prompt,
            prompt_tokens: outcome.prompt_tokens,
            completion: outcome.completion,
            completion_tokens: outcome.completion_tokens,
            status: outcome.status,
            ttft_ms: outcome.ttft_ms,
            duration_ms: outcome.duration_ms,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Completion>> {
        let query = format!("SELECT {} FROM completions WHERE id = ?", COMPLETION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_completion).transpose()
    }

    async fn list_by_api_key(
        &self,
        api_key_id: i64,
        params: ListParams,
    ) -> DbResult<Vec<Completion>> {
        let query = format!(
            "SELECT {} FROM completions WHERE api_key_id = ? ORDER BY id {} LIMIT ?",
            COMPLETION_COLUMNS,
            params.sort_order.as_sql()
        );
        let rows = sqlx::query(&query)
            .bind(api_key_id)
            .bind(params.limit())
            .fetch_all(&self.pool)
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
                COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0) AS errors,
                COALESCE(SUM(CASE WHEN prompt_tokens >= 0 THEN prompt_tokens ELSE 0 END), 0) AS prompt_tokens,
                COALESCE(SUM(CASE WHEN completion_tokens >= 0 THEN completion_tokens ELSE 0 END), 0) AS completion_tokens,
                COALESCE(SUM(CASE WHEN prompt_tokens = -1 THEN 1 ELSE 0 END), 0) AS unreported_prompt_tokens,
                COALESCE(SUM(CASE WHEN completion_tokens = -1 THEN 1 ELSE 0 END), 0) AS unreported_completion_tokens
            FROM completions
            WHERE api_key_id = ? AND created_at >= ? AND created_at < ?
            "#,
        )
        .bind(api_key_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
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
