use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ModelRepo,
    },
    models::{CreateModel, Model, ModelCounts, ModelType},
};

pub struct SqliteModelRepo {
    pool: SqlitePool,
}

impl SqliteModelRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_model(row: &sqlx::sqlite::SqliteRow) -> DbResult<Model> {
        Ok(Model {
            id: row.get("id"),
            provider_id: row.get("provider_id"),
            name: row.get("name"),
            model_type: parse_text_enum(row.get("model_type"), "model type")?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ModelRepo for SqliteModelRepo {
    async fn create(&self, input: CreateModel) -> DbResult<Model> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO models (provider_id, name, model_type, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(input.provider_id)
        .bind(&input.name)
        .bind(input.model_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict(
                format!("Provider {} already serves model '{}'", input.provider_id, input.name),
            ),
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Provider {} does not exist", input.provider_id))
            }
            _ => DbError::from(e),
        })?;

        Ok(Model {
            id: result.last_insert_rowid(),
            provider_id: input.provider_id,
            name: input.name,
            model_type: input.model_type,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Model>> {
        let row = sqlx::query(
            "SELECT id, provider_id, name, model_type, created_at FROM models WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_model).transpose()
    }

    async fn list_by_provider(&self, provider_id: i64) -> DbResult<Vec<Model>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider_id, name, model_type, created_at
            FROM models
            WHERE provider_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_model).collect()
    }

    async fn count_by_type(&self) -> DbResult<ModelCounts> {
        let rows = sqlx::query(
            "SELECT model_type, COUNT(*) AS count FROM models GROUP BY model_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ModelCounts::default();
        for row in &rows {
            let count: i64 = row.get("count");
            match parse_text_enum::<ModelType>(row.get("model_type"), "model type")? {
                ModelType::Chat => counts.chat = count,
                ModelType::Embedding => counts.embedding = count,
            }
        }
        Ok(counts)
    }
}
