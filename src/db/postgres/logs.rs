use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::LogRepo,
    },
    models::{LogEntry, NewLogEntry},
};

const LOG_COLUMNS: &str = "id, level, message, details, related_api_key_id, related_upstream_id, \
     related_completion_id, created_at";

pub struct PostgresLogRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresLogRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_log_entry(row: &sqlx::postgres::PgRow) -> DbResult<LogEntry> {
        let details = row
            .get::<Option<serde_json::Value>, _>("details")
            .map(serde_json::from_value)
            .transpose()?;

        Ok(LogEntry {
            id: row.get("id"),
            level: parse_text_enum(row.get("level"), "log level")?,
            message: row.get("message"),
            details,
            related_api_key_id: row.get("related_api_key_id"),
            related_upstream_id: row.get("related_upstream_id"),
            related_completion_id: row.get("related_completion_id"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl LogRepo for PostgresLogRepo {
    async fn create(&self, input: NewLogEntry) -> DbResult<LogEntry> {
        let details = input
            .details
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let query = format!(
            r#"
            INSERT INTO logs (
                level, message, details, related_api_key_id, related_upstream_id,
                related_completion_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            LOG_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(input.level.as_str())
            .bind(&input.message)
            .bind(details)
            .bind(input.related_api_key_id)
            .bind(input.related_upstream_id)
            .bind(input.related_completion_id)
            .fetch_one(&self.write_pool)
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

        Self::parse_log_entry(&row)
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<LogEntry>> {
        let query = format!("SELECT {} FROM logs WHERE id = $1", LOG_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.read_pool)
            .await?;

        row.as_ref().map(Self::parse_log_entry).transpose()
    }

    async fn list_by_completion(&self, completion_id: i64) -> DbResult<Vec<LogEntry>> {
        let query = format!(
            "SELECT {} FROM logs WHERE related_completion_id = $1 ORDER BY id ASC",
            LOG_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(completion_id)
            .fetch_all(&self.read_pool)
            .await?;

        rows.iter().map(Self::parse_log_entry).collect()
    }
}
