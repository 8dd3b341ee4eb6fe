use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::{parse_json_text, parse_text_enum};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::LogRepo,
    },
    models::{LogDetails, LogEntry, NewLogEntry},
};

const LOG_COLUMNS: &str = "id, level, message, details, related_api_key_id, related_upstream_id, \
     related_completion_id, created_at";

pub struct SqliteLogRepo {
    pool: SqlitePool,
}

impl SqliteLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_log_entry(row: &sqlx::sqlite::SqliteRow) -> DbResult<LogEntry> {
        let details: Option<&str> = row.get("details");

        Ok(LogEntry {
            id: row.get("id"),
            level: parse_text_enum(row.get("level"), "log level")?,
            message: row.get("message"),
            details: details.map(parse_json_text::<LogDetails>).transpose()?,
            related_api_key_id: row.get("related_api_key_id"),
            related_upstream_id: row.get("related_upstream_id"),
            related_completion_id: row.get("related_completion_id"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl LogRepo for SqliteLogRepo {
    async fn create(&self, input: NewLogEntry) -> DbResult<LogEntry> {
        let now = chrono::Utc::now();
        let details = input
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO logs (
                level, message, details, related_api_key_id, related_upstream_id,
                related_completion_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.level.as_str())
        .bind(&input.message)
        .bind(details)
        .bind(input.related_api_key_id)
        .bind(input.related_upstream_id)
        .bind(input.related_completion_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!(
                    "Completion {} does not exist",
                    input.related_completion_id
                ))
            }
            _ => DbError::from(e),
        })?;

        Ok(LogEntry {
            id: result.last_insert_rowid(),
            level: input.level,
            message: input.message,
            details: input.details,
            related_api_key_id: input.related_api_key_id,
            related_upstream_id: input.related_upstream_id,
            related_completion_id: input.related_completion_id,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<LogEntry>> {
        let query = format!("SELECT {} FROM logs WHERE id = ?", LOG_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_log_entry).transpose()
    }

    async fn list_by_completion(&self, completion_id: i64) -> DbResult<Vec<LogEntry>> {
        let query = format!(
            "SELECT {} FROM logs WHERE related_completion_id = ? ORDER BY id ASC",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(completion_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::parse_log_entry).collect()
    }
}
